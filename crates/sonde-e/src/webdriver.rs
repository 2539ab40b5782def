use fantoccini::{Client, ClientBuilder};
use serde_json::{Map, Value, json};

pub type Capabilities = Map<String, Value>;

pub struct WebDriverClient {
    pub client: Client,
}

impl WebDriverClient {
    pub async fn connect(
        url: &str,
        capabilities: Option<Capabilities>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mut caps = Capabilities::new();
        if let Some(user_caps) = capabilities {
            for (k, v) in user_caps {
                caps.insert(k, v);
            }
        }

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(url)
            .await
            .map_err(|e| format!("Failed to connect to WebDriver at {}: {}", url, e))?;

        Ok(Self { client })
    }

    pub async fn close(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.client
            .close()
            .await
            .map_err(|e| format!("Failed to close session: {}", e))?;
        Ok(())
    }
}

/// Browser options asking Chrome and Firefox to run without a window.
/// Drivers ignore vendor keys they do not understand.
pub fn headless_capabilities(window_size: (u32, u32)) -> Capabilities {
    let (width, height) = window_size;
    let mut caps = Capabilities::new();
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": [
                "--headless=new",
                "--no-sandbox",
                "--disable-gpu",
                format!("--window-size={},{}", width, height),
            ]
        }),
    );
    caps.insert(
        "moz:firefoxOptions".to_string(),
        json!({
            "args": [
                "-headless",
                format!("--width={}", width),
                format!("--height={}", height),
            ]
        }),
    );
    caps
}
