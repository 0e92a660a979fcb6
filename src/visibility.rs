//! Rendered-visibility check for elements, used to skip hidden iframes.
//!
//! Invisible frames on webmail pages hold ads, trackers and placeholder
//! editors; their text must never win the body scan. Visibility is resolved
//! from what the markup carries: inline `style` declarations, the `hidden`
//! attribute, and `width`/`height` attributes, with the usual defaults for
//! replaced elements.

use scraper::ElementRef;
use std::collections::HashMap;

/// Default box of an iframe (and other replaced elements) without explicit
/// dimensions.
const REPLACED_DEFAULT_SIZE: (f64, f64) = (300.0, 150.0);

const REPLACED_ELEMENTS: [&str; 6] = ["iframe", "frame", "embed", "object", "video", "canvas"];

/// Effective style of an element after walking its ancestors.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    /// `display: none` (or `hidden`) on the element or any ancestor.
    pub display_none: bool,
    /// Effective `visibility` is `hidden` or `collapse`.
    pub visibility_hidden: bool,
    /// Product of the opacities along the ancestor chain.
    pub opacity: f64,
    /// Resolved box width; zero means collapsed.
    pub width: f64,
    /// Resolved box height; zero means collapsed.
    pub height: f64,
}

impl ComputedStyle {
    /// Resolve the effective style of `element`.
    pub fn of(element: ElementRef<'_>) -> Self {
        let mut display_none = false;
        let mut visibility: Option<bool> = None;
        let mut opacity = 1.0;

        for node in std::iter::once(element).chain(element.ancestors().filter_map(ElementRef::wrap)) {
            let style = declarations(node);

            match style.get("display").map(String::as_str) {
                Some("none") => display_none = true,
                Some(_) => {}
                None if node.value().attr("hidden").is_some() => display_none = true,
                None => {}
            }

            // Nearest declaration wins; visibility is inherited.
            if visibility.is_none() {
                if let Some(value) = style.get("visibility") {
                    visibility = Some(matches!(value.as_str(), "hidden" | "collapse"));
                }
            }

            if let Some(value) = style.get("opacity").and_then(|v| parse_opacity(v)) {
                opacity *= value;
            }

            if display_none {
                break;
            }
        }

        let (width, height) = resolve_box(element);

        Self {
            display_none,
            visibility_hidden: visibility.unwrap_or(false),
            opacity,
            width,
            height,
        }
    }

    /// True when the element would actually paint something.
    pub fn is_rendered(&self) -> bool {
        if self.display_none || self.visibility_hidden || self.opacity <= 0.0 {
            return false;
        }
        self.width > 0.0 && self.height > 0.0
    }
}

/// Whether `element` is rendered with a non-empty box.
///
/// Hidden by `display`, `visibility` or zero `opacity` anywhere relevant in
/// its ancestry means not visible; so does a zero-width or zero-height box.
pub fn is_visible(element: ElementRef<'_>) -> bool {
    ComputedStyle::of(element).is_rendered()
}

/// Inline declarations of an element, lower-cased, last one wins.
/// Malformed declarations are skipped.
fn declarations(element: ElementRef<'_>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Some(style) = element.value().attr("style") else {
        return map;
    };

    for declaration in style.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let property = property.trim().to_ascii_lowercase();
        let value = value
            .trim()
            .trim_end_matches("!important")
            .trim()
            .to_ascii_lowercase();
        if property.is_empty() || value.is_empty() {
            continue;
        }
        map.insert(property, value);
    }
    map
}

fn parse_opacity(value: &str) -> Option<f64> {
    let parsed = match value.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f64>().ok()? / 100.0,
        None => value.parse::<f64>().ok()?,
    };
    parsed.is_finite().then(|| parsed.clamp(0.0, 1.0))
}

/// A CSS length. `Auto` leaves the size to layout; only the zero-ness of
/// relative units matters here, so they resolve to their raw number.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Length {
    Auto,
    Fixed(f64),
}

fn parse_length(value: &str) -> Option<Length> {
    let value = value.trim();
    if value == "auto" {
        return Some(Length::Auto);
    }

    let number_end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(number_end);
    let number: f64 = number.parse().ok()?;
    // Negative sizes are invalid and the declaration is dropped.
    if !number.is_finite() || number < 0.0 {
        return None;
    }

    match unit.trim() {
        "" | "px" | "%" | "em" | "rem" | "vw" | "vh" | "pt" | "ch" | "ex" => Some(Length::Fixed(number)),
        _ => None,
    }
}

fn resolve_box(element: ElementRef<'_>) -> (f64, f64) {
    let style = declarations(element);
    let tag = element.value().name();
    let replaced = REPLACED_ELEMENTS.contains(&tag);

    let dimension = |property: &str| -> Length {
        style
            .get(property)
            .and_then(|value| parse_length(value))
            .or_else(|| {
                element
                    .value()
                    .attr(property)
                    .and_then(parse_length)
            })
            .unwrap_or(Length::Auto)
    };

    let width = match dimension("width") {
        Length::Fixed(px) => px,
        Length::Auto if replaced => REPLACED_DEFAULT_SIZE.0,
        // Block boxes fill their container.
        Length::Auto => 1.0,
    };

    let height = match dimension("height") {
        Length::Fixed(px) => px,
        Length::Auto if replaced => REPLACED_DEFAULT_SIZE.1,
        Length::Auto if has_content(element) => 1.0,
        Length::Auto => 0.0,
    };

    (width, height)
}

fn has_content(element: ElementRef<'_>) -> bool {
    element.children().any(|child| match child.value() {
        scraper::Node::Element(_) => true,
        scraper::Node::Text(text) => !text.trim().is_empty(),
        _ => false,
    })
}
