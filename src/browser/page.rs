use super::manager::{cdp_error, BrowserError};
use headless_chrome::protocol::cdp::Page;
use headless_chrome::Tab;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Navigate to a URL and wait until the document reports `complete`
pub fn navigate(tab: &Tab, url: &str, timeout: Duration) -> Result<(), BrowserError> {
    tab.navigate_to(url).map_err(|e| {
        cdp_error(format!("Failed to navigate to {}: {}", url, e), BrowserError::NavigationError)
    })?;

    tab.wait_until_navigated().map_err(|e| {
        cdp_error(format!("Navigation timeout for {}: {}", url, e), BrowserError::NavigationError)
    })?;

    wait_ready(tab, timeout)
}

/// Poll `document.readyState` until it is `complete`
pub fn wait_ready(tab: &Tab, timeout: Duration) -> Result<(), BrowserError> {
    let start = Instant::now();

    loop {
        if eval_string(tab, "document.readyState")?.as_str() == "complete" {
            return Ok(());
        }
        if start.elapsed() > timeout {
            return Err(BrowserError::Timeout("document.readyState == complete".to_string()));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Wait for an element matching a CSS selector (a selector list matches any of them)
pub fn wait_for(tab: &Tab, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
    tab.wait_for_element_with_custom_timeout(selector, timeout)
        .map(|_| ())
        .map_err(|e| cdp_error(format!("{} ({})", selector, e), BrowserError::Timeout))
}

/// Wait for an element matching an XPath expression
pub fn wait_for_xpath(tab: &Tab, xpath: &str, timeout: Duration) -> Result<(), BrowserError> {
    tab.wait_for_xpath_with_custom_timeout(xpath, timeout)
        .map(|_| ())
        .map_err(|e| cdp_error(format!("{} ({})", xpath, e), BrowserError::Timeout))
}

/// Whether any element currently matches the CSS selector
pub fn exists(tab: &Tab, selector: &str) -> bool {
    let script = format!("document.querySelector({}) !== null", js_string(selector));
    eval_bool(tab, &script).unwrap_or(false)
}

/// Whether any element currently contains the given text
pub fn contains_text(tab: &Tab, text: &str) -> bool {
    tab.find_elements_by_xpath(&text_xpath(text))
        .map(|found| !found.is_empty())
        .unwrap_or(false)
}

/// XPath matching any element whose own text contains `text`
pub fn text_xpath(text: &str) -> String {
    format!("//*[contains(text(), '{}')]", text.replace('\'', ""))
}

/// Clear an input and type into it
pub fn fill(tab: &Tab, selector: &str, text: &str) -> Result<(), BrowserError> {
    let clear = format!(
        "(function() {{ const el = document.querySelector({}); if (el) {{ el.value = ''; }} return el !== null; }})()",
        js_string(selector)
    );
    if !eval_bool(tab, &clear)? {
        return Err(BrowserError::ElementNotFound(selector.to_string()));
    }

    let element = tab
        .find_element(selector)
        .map_err(|e| cdp_error(format!("{}: {}", selector, e), BrowserError::ElementNotFound))?;
    element
        .click()
        .and_then(|el| el.type_into(text))
        .map_err(|e| cdp_error(format!("Typing into {}: {}", selector, e), BrowserError::JavaScriptError))?;
    Ok(())
}

/// Click the first element matching the CSS selector with a real mouse event
pub fn click(tab: &Tab, selector: &str) -> Result<(), BrowserError> {
    let element = tab
        .find_element(selector)
        .map_err(|e| cdp_error(format!("{}: {}", selector, e), BrowserError::ElementNotFound))?;
    element
        .click()
        .map_err(|e| cdp_error(format!("Click failed: {}", e), BrowserError::JavaScriptError))?;
    Ok(())
}

/// Click the first element matching an XPath expression
pub fn click_xpath(tab: &Tab, xpath: &str, timeout: Duration) -> Result<(), BrowserError> {
    let element = tab
        .wait_for_xpath_with_custom_timeout(xpath, timeout)
        .map_err(|e| cdp_error(format!("{}: {}", xpath, e), BrowserError::ElementNotFound))?;
    element
        .click()
        .map_err(|e| cdp_error(format!("Click failed: {}", e), BrowserError::JavaScriptError))?;
    Ok(())
}

/// Scroll the first element matching the selector to the middle of the viewport
pub fn scroll_into_view(tab: &Tab, selector: &str) -> Result<(), BrowserError> {
    let script = format!(
        "(function() {{ const el = document.querySelector({}); if (el) {{ el.scrollIntoView({{block: 'center'}}); }} return el !== null; }})()",
        js_string(selector)
    );
    if eval_bool(tab, &script)? {
        Ok(())
    } else {
        Err(BrowserError::ElementNotFound(selector.to_string()))
    }
}

/// The `class` attribute of the first element matching the selector
pub fn class_name(tab: &Tab, selector: &str) -> Result<String, BrowserError> {
    let script = format!(
        "(function() {{ const el = document.querySelector({}); return el ? String(el.className) : null; }})()",
        js_string(selector)
    );
    let value = evaluate(tab, &script)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))
}

pub fn scroll_to(tab: &Tab, y: i64) -> Result<(), BrowserError> {
    evaluate(tab, &format!("window.scrollTo(0, {}); true", y)).map(|_| ())
}

pub fn scroll_to_bottom(tab: &Tab) -> Result<(), BrowserError> {
    evaluate(tab, "window.scrollTo(0, document.body.scrollHeight); true").map(|_| ())
}

/// Full document height and viewport height, in pixels
pub fn dimensions(tab: &Tab) -> Result<(i64, i64), BrowserError> {
    let total = eval_number(tab, "document.body.scrollHeight")?;
    let viewport = eval_number(tab, "window.innerHeight")?;
    Ok((total as i64, viewport as i64))
}

/// Click on the page body
pub fn click_body(tab: &Tab) -> Result<(), BrowserError> {
    click(tab, "body")
}

/// Get the HTML content of the page
pub fn html(tab: &Tab) -> Result<String, BrowserError> {
    tab.get_content()
        .map_err(|e| cdp_error(e, BrowserError::JavaScriptError))
}

pub fn screenshot(tab: &Tab) -> Result<Vec<u8>, BrowserError> {
    tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
        .map_err(|e| cdp_error(format!("Screenshot failed: {}", e), BrowserError::CaptureError))
}

/// Execute JavaScript and return its JSON value (`null` when it produced none)
pub fn evaluate(tab: &Tab, script: &str) -> Result<serde_json::Value, BrowserError> {
    let result = tab
        .evaluate(script, false)
        .map_err(|e| cdp_error(e, BrowserError::JavaScriptError))?;
    Ok(result.value.unwrap_or(serde_json::Value::Null))
}

pub fn eval_bool(tab: &Tab, script: &str) -> Result<bool, BrowserError> {
    Ok(evaluate(tab, script)?.as_bool().unwrap_or(false))
}

pub fn eval_number(tab: &Tab, script: &str) -> Result<f64, BrowserError> {
    evaluate(tab, script)?
        .as_f64()
        .ok_or_else(|| BrowserError::JavaScriptError(format!("`{}` did not return a number", script)))
}

pub fn eval_string(tab: &Tab, script: &str) -> Result<String, BrowserError> {
    evaluate(tab, script)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BrowserError::JavaScriptError(format!("`{}` did not return a string", script)))
}

/// Quote a value as a JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
