//! Page scripts the engine asks drivers to evaluate

/// Single structural query used by observation capture.
///
/// Returns `{ elements: [...], visible_text: "..." }` where each element
/// carries `tag`, `id`, `name`, `type`, `role`, `testid`, `label`, `text`,
/// `value` and `href` when present. Only visible anchors, inputs, buttons and
/// role-bearing controls are reported.
pub const KEY_ELEMENTS_PROBE: &str = r#"(() => {
    const MAX = 500;
    const isVisible = (el) => {
        const style = window.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        return style.visibility !== 'hidden' &&
            style.display !== 'none' &&
            (rect.width > 0 || rect.height > 0 || el.getClientRects().length > 0);
    };
    const pick = (el) => {
        const out = { tag: el.tagName.toLowerCase() };
        const set = (key, value) => {
            if (value !== null && value !== undefined && value !== '') out[key] = String(value);
        };
        set('id', el.id);
        set('name', el.getAttribute('name'));
        set('type', el.getAttribute('type'));
        set('role', el.getAttribute('role'));
        set('testid', el.getAttribute('data-testid'));
        set('label', el.getAttribute('aria-label'));
        set('href', el.getAttribute('href'));
        if ('value' in el && out.tag !== 'button') set('value', el.value);
        set('text', (el.innerText || el.textContent || '').trim().slice(0, 200));
        return out;
    };
    const nodes = Array.from(document.querySelectorAll(
        'a, button, input, select, textarea, [role="button"], [role="link"], [data-testid]'
    ));
    const elements = [];
    for (const el of nodes) {
        if (elements.length >= MAX) break;
        if (isVisible(el)) elements.push(pick(el));
    }
    const visible_text = (document.body ? document.body.innerText : '') || '';
    return { elements, visible_text };
})()"#;
