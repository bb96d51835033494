// Google Meet pre-join and in-call controls
//
// Class names and jsname values are Meet's obfuscated markup and change
// without notice. Each cascade lists the most specific match first.

use serde_json::json;

use super::strategy::{Cascade, ClickFirstVisible, FillFirstVisible, ScriptStrategy};
use crate::browser::Selector;

/// Fill the first name-like input with `arguments[0]`
pub const NAME_FILL_SCRIPT: &str = r#"
const name = arguments[0];
for (const input of document.querySelectorAll('input')) {
    const placeholder = (input.placeholder || '').toLowerCase();
    const label = (input.getAttribute('aria-label') || '').toLowerCase();
    if (placeholder.includes('name') || label.includes('name') || input.id === 'c11') {
        input.value = name;
        input.dispatchEvent(new Event('input', { bubbles: true }));
        input.dispatchEvent(new Event('change', { bubbles: true }));
        return true;
    }
}
return false;
"#;

pub const NAME_CSS_SELECTORS: &[&str] = &[
    "input[placeholder='Your name']",
    "input[aria-label='Your name']",
    "#c11",
    "input.qdOxv-fmcmS-wGMbrd",
    "input[type='text']",
];

pub const NAME_XPATHS: &[&str] = &[
    "//input[@placeholder='Your name']",
    "//input[contains(@placeholder, 'name')]",
    "//input[@aria-label='Your name']",
    "//input[contains(@aria-label, 'name')]",
    "//input[@type='text']",
];

pub const MIC_OFF_SELECTOR: &str =
    "div[data-tooltip='Turn off microphone (ctrl + d)'], [aria-label='Turn off microphone']";

pub const CAMERA_OFF_SELECTOR: &str =
    "div[data-tooltip='Turn off camera (ctrl + e)'], [aria-label='Turn off camera']";

/// Click visible, unmuted mic and camera controls.
/// Returns `{micClicked, camClicked}`.
pub const MUTE_SCRIPT: &str = r#"
function turnOff(selector) {
    for (const button of document.querySelectorAll(selector)) {
        if (button.offsetParent !== null && button.getAttribute('data-is-muted') !== 'true') {
            button.click();
            return true;
        }
    }
    return false;
}
const micClicked = turnOff('[data-tooltip="Turn off microphone (ctrl + d)"], [aria-label="Turn off microphone"]');
const camClicked = turnOff('[data-tooltip="Turn off camera (ctrl + e)"], [aria-label="Turn off camera"]');
return { micClicked, camClicked };
"#;

/// The "Ask to join" button by its exact class/jsname signature, then by
/// its label span
pub const JOIN_SIGNATURE_SCRIPT: &str = r#"
const exact = document.querySelector('button.UywwFc-LgbsSe[jsname="Qx7uuf"], button.UywwFc-LgbsSe.tusd3.IyLmn');
if (exact) {
    exact.click();
    return true;
}
for (const span of document.querySelectorAll('span.UywwFc-vQzf8d')) {
    if (span.innerText && span.innerText.trim() === 'Ask to join') {
        const button = span.closest('button');
        if (button) {
            button.click();
            return true;
        }
    }
}
return false;
"#;

pub const JOIN_SIGNATURE_XPATH: &str = "//button[contains(@class, 'UywwFc-LgbsSe') and \
     .//span[contains(@class, 'UywwFc-vQzf8d') and text()='Ask to join']]";

pub const JOIN_CSS_SELECTORS: &[&str] = &["button[jsname='Qx7uuf']", "button.UywwFc-LgbsSe"];

pub const JOIN_TEXT_XPATHS: &[&str] = &[
    "//button[contains(., 'Ask to join')]",
    "//button[contains(., 'ask to join')]",
    "//button[contains(., 'Join now')]",
    "//button[contains(., 'join now')]",
    "//button//span[contains(., 'Ask to join')]/parent::button",
    "//button//span[contains(., 'Join now')]/parent::button",
];

/// Visible only once admitted: the meeting details panel
pub const MEETING_DETAIL_XPATHS: &[&str] = &[
    "//div[contains(text(), 'Meeting details')]",
    "//button[@aria-label='Close']",
    "//div[contains(text(), 'Joining info')]",
    "//div[contains(text(), 'meet.google.com')]",
    "//span[contains(text(), 'Copy joining info')]",
];

/// In-call toolbar and side panels
pub const MEETING_UI_XPATHS: &[&str] = &[
    "//button[contains(@aria-label, 'participants')]",
    "//button[contains(@aria-label, 'chat')]",
    "//div[@role='complementary']",
    "//button[contains(@aria-label, 'microphone') or contains(@aria-label, 'camera')]",
];

pub const LEAVE_CSS_SELECTORS: &[&str] = &["button[aria-label*='leave' i]", "button[jsname='CQylAd']"];

pub const LEAVE_XPATH: &str = "//button[contains(., 'Leave') or contains(., 'leave')]";

pub const DEFAULT_END_PHRASES: &[&str] = &["meeting ended", "you left the meeting", "call has ended"];

pub fn name_cascade(display_name: &str) -> Cascade {
    let mut cascade = Cascade::new("Name field").with(ScriptStrategy::new(
        "scripted fill",
        NAME_FILL_SCRIPT,
        vec![json!(display_name)],
    ));
    for selector in NAME_CSS_SELECTORS {
        cascade = cascade.with(FillFirstVisible::new(Selector::css(*selector), display_name));
    }
    for xpath in NAME_XPATHS {
        cascade = cascade.with(FillFirstVisible::new(Selector::xpath(*xpath), display_name));
    }
    cascade
}

pub fn join_cascade() -> Cascade {
    let mut cascade = Cascade::new("Join button")
        .with(ScriptStrategy::new(
            "exact control signature",
            JOIN_SIGNATURE_SCRIPT,
            Vec::new(),
        ))
        .with(ClickFirstVisible::new(Selector::xpath(JOIN_SIGNATURE_XPATH)).enabled_only());
    for selector in JOIN_CSS_SELECTORS {
        cascade = cascade.with(ClickFirstVisible::new(Selector::css(*selector)).enabled_only());
    }
    for xpath in JOIN_TEXT_XPATHS {
        cascade = cascade.with(ClickFirstVisible::new(Selector::xpath(*xpath)).enabled_only());
    }
    cascade
}

pub fn leave_cascade() -> Cascade {
    let mut cascade = Cascade::new("Leave button");
    for selector in LEAVE_CSS_SELECTORS {
        cascade = cascade.with(ClickFirstVisible::new(Selector::css(*selector)));
    }
    cascade.with(ClickFirstVisible::new(Selector::xpath(LEAVE_XPATH)))
}

/// Selectors whose visible match shows we are inside the call
pub fn join_indicators() -> Vec<Selector> {
    MEETING_DETAIL_XPATHS
        .iter()
        .chain(MEETING_UI_XPATHS)
        .map(|xpath| Selector::xpath(*xpath))
        .collect()
}
