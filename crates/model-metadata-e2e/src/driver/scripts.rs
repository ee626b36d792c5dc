//! In-page JavaScript used by the CDP driver
//!
//! The resolver walks locator steps against the live DOM, tags every match
//! with a `data-e2e-handle` attribute and returns a description of each one.
//! The driver then addresses elements with `[data-e2e-handle="<id>"]`.

/// Attribute carrying resolved element ids
pub const HANDLE_ATTR: &str = "data-e2e-handle";

/// CSS selector for a handle id
pub fn handle_selector(id: &str) -> String {
    format!("[{}=\"{}\"]", HANDLE_ATTR, id)
}

/// Expression evaluating the resolver against serialized locator steps.
///
/// Evaluates to `{ "elements": [...] }` or
/// `{ "ambiguous": { "step": <index>, "count": <n> } }`.
pub fn resolve_expression(steps_json: &str) -> String {
    format!("({})({})", resolver_script(), steps_json)
}

fn resolver_script() -> &'static str {
    r#"
function (steps) {
    'use strict';

    const HANDLE = 'data-e2e-handle';
    const IGNORED = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE']);

    const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();

    const ownText = (el) => norm(
        Array.from(el.childNodes)
            .filter((n) => n.nodeType === Node.TEXT_NODE)
            .map((n) => n.textContent)
            .join('')
    );

    const isVisible = (el) => {
        if (!el.isConnected) return false;
        const style = window.getComputedStyle(el);
        if (style.display === 'none' || style.visibility === 'hidden') return false;
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    };

    const textMatches = (matcher, text) => {
        switch (matcher.mode) {
            case 'exact': return text === norm(matcher.value);
            case 'substring': return text.includes(matcher.value);
            case 'pattern': return new RegExp(matcher.value).test(text);
            default: return false;
        }
    };

    const unique = (elements) => Array.from(new Set(elements));

    const descendants = (subjects, selector) => unique(
        subjects.flatMap((s) => Array.from(s.querySelectorAll(selector)))
    ).filter((el) => !IGNORED.has(el.tagName));

    const escape = (value) => window.CSS && CSS.escape ? CSS.escape(value) : value.replace(/"/g, '\\"');

    const labelled = (subjects, text) => {
        const controls = [];
        for (const label of descendants(subjects, 'label')) {
            if (norm(label.textContent) !== text) continue;
            const control = label.control
                || label.querySelector('input, select, textarea, button');
            if (control) controls.push(control);
            if (label.id) {
                controls.push(...descendants(subjects, `[aria-labelledby~="${escape(label.id)}"]`));
            }
        }
        for (const el of descendants(subjects, '[aria-label]')) {
            if (norm(el.getAttribute('aria-label')) === text) controls.push(el);
        }
        return unique(controls);
    };

    const accessibleName = (el) => norm(
        el.getAttribute('aria-label') || el.textContent || el.value || ''
    );

    const contains = (subjects, matcher) => {
        for (const subject of subjects) {
            const candidates = [subject, ...subject.querySelectorAll('*')]
                .filter((el) => !IGNORED.has(el.tagName))
                .filter((el) => textMatches(matcher, norm(el.textContent)));
            const deepest = candidates.filter(
                (c) => !candidates.some((o) => o !== c && c.contains(o))
            );
            if (deepest.length > 0) return [deepest[0]];
        }
        return [];
    };

    const apply = (subjects, step) => {
        switch (step.kind) {
            case 'test_id':
                return descendants(subjects, `[data-testid="${escape(step.id)}"]`);
            case 'text':
                return descendants(subjects, '*').filter((el) => ownText(el) === norm(step.text));
            case 'display_value':
                return descendants(subjects, 'input, select, textarea').filter((el) => {
                    if (el.tagName === 'SELECT') {
                        return Array.from(el.selectedOptions).some((o) => norm(o.textContent) === step.value);
                    }
                    return el.value === step.value;
                });
            case 'placeholder':
                return descendants(subjects, '[placeholder]')
                    .filter((el) => el.getAttribute('placeholder') === step.text);
            case 'label_text':
                return labelled(subjects, norm(step.text));
            case 'button':
                return descendants(subjects, 'button, [role="button"], input[type="button"], input[type="submit"]')
                    .filter((el) => accessibleName(el) === norm(step.name));
            case 'css':
                return descendants(subjects, step.selector);
            case 'contains':
                return contains(subjects, step.matcher);
            case 'closest':
                return unique(subjects.map((el) => el.closest(step.selector)).filter(Boolean));
            case 'parent':
                return unique(subjects.map((el) => el.parentElement).filter(Boolean));
            case 'visible':
                return subjects.filter(isVisible);
            default:
                throw new Error('unknown locator step: ' + step.kind);
        }
    };

    const SINGLE = new Set(['text', 'display_value', 'placeholder', 'label_text', 'button']);

    let subjects = [document.body];
    for (let i = 0; i < steps.length; i++) {
        const step = steps[i];
        subjects = apply(subjects, step);
        const single = SINGLE.has(step.kind) || (step.kind === 'test_id' && !step.all);
        if (single && subjects.length > 1) {
            return { ambiguous: { step: i, count: subjects.length } };
        }
    }

    window.__e2eHandleSeq = window.__e2eHandleSeq || 0;
    const elements = subjects.map((el) => {
        if (!el.hasAttribute(HANDLE)) {
            window.__e2eHandleSeq += 1;
            el.setAttribute(HANDLE, String(window.__e2eHandleSeq));
        }
        const hasValue = 'value' in el && typeof el.value === 'string' && el.tagName !== 'BUTTON';
        return {
            id: el.getAttribute(HANDLE),
            tag: el.tagName.toLowerCase(),
            visible: isVisible(el),
            text: norm(el.textContent),
            value: hasValue ? el.value : null,
        };
    });
    return { elements };
}
"#
}

/// Clears a text control through the native value setter so framework-managed
/// inputs observe the change.
pub const CLEAR_FN: &str = r#"function () {
    const proto = this instanceof HTMLTextAreaElement
        ? HTMLTextAreaElement.prototype
        : HTMLInputElement.prototype;
    const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
    this.focus();
    setter.call(this, '');
    this.dispatchEvent(new Event('input', { bubbles: true }));
    this.dispatchEvent(new Event('change', { bubbles: true }));
}"#;

pub const FORCE_CLICK_FN: &str = "function () { this.click(); }";

pub const BLUR_FN: &str = "function () { this.blur(); }";

pub fn scroll_to_fn(x: i64, y: i64) -> String {
    format!("function () {{ this.scrollTo({}, {}); }}", x, y)
}

pub const UNOBSTRUCTED_FN: &str = r#"function () {
    const rect = this.getBoundingClientRect();
    const hit = document.elementFromPoint(rect.left + rect.width / 2, rect.top + rect.height / 2);
    return !!hit && (hit === this || this.contains(hit));
}"#;

pub const SCROLLED_TO_TOP_FN: &str =
    "function () { return this.scrollTop === 0 && this.scrollLeft === 0; }";
