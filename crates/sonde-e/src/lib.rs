//! Driver for any W3C WebDriver endpoint (chromedriver, geckodriver, Selenium).

pub mod driver;
pub mod webdriver;

pub use driver::WebDriverDriver;
