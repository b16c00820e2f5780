//! Page scripts injected during a capture.

/// Element id of the stylesheet that freezes animations.
pub const PAUSE_STYLE_ID: &str = "__reel_paused";

/// Script registered before navigation that freezes every CSS animation and
/// transition until [`resume_expression`] removes it.
pub fn pause_script() -> String {
    format!(
        r"(() => {{
    const style = document.createElement('style');
    style.id = '{PAUSE_STYLE_ID}';
    style.textContent = '*, *::before, *::after {{ animation-play-state: paused !important; transition: none !important; }}';
    (document.head || document.documentElement).appendChild(style);
}})();"
    )
}

/// Expression removing the pause stylesheet.
pub fn resume_expression() -> String {
    format!(
        r"(() => {{
    const style = document.getElementById('{PAUSE_STYLE_ID}');
    if (style) style.remove();
    return true;
}})()"
    )
}

/// Expression installing an imperceptible opacity animation on `html` so the
/// compositor produces a fresh frame every period.
pub fn repaint_expression(period_ms: u64) -> String {
    format!(
        r"(() => {{
    const style = document.createElement('style');
    style.id = '__reel_repaint';
    style.textContent = '@keyframes __reel_repaint {{ 0% {{ opacity: 1; }} 50% {{ opacity: 0.99; }} 100% {{ opacity: 1; }} }} html {{ animation: __reel_repaint {period_ms}ms linear infinite; }}';
    (document.head || document.documentElement).appendChild(style);
    return true;
}})()"
    )
}
