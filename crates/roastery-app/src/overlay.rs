// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Transient overlays: tooltips anchored to an element and declarative
//! modals opened by a trigger.

use crate::NodeId;
use crate::binding::{
    MODAL, MODAL_CLOSE, MODAL_TARGET, TOOLTIP, TOOLTIP_POPUP, TOOLTIP_POSITION, text_attr,
};
use crate::dom::Document;

const TOOLTIP_GAP: i32 = 1;
const TOOLTIP_PADDING: i32 = 4;
const TOOLTIP_CHROME_ROWS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn right(self) -> i32 {
        self.x + self.width
    }

    pub const fn bottom(self) -> i32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TooltipSide {
    #[default]
    Top,
    Bottom,
    Left,
    Right,
}

impl TooltipSide {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("bottom") => Self::Bottom,
            Some("left") => Self::Left,
            Some("right") => Self::Right,
            _ => Self::Top,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Places a `width` x `height` box beside `anchor` on `side`, then clamps it
/// so it keeps at least `margin` units from every viewport edge. When the
/// viewport is too small for that, the box is pinned to the top-left margin.
pub fn place_tooltip(
    anchor: Rect,
    width: i32,
    height: i32,
    viewport: Rect,
    side: TooltipSide,
    margin: i32,
) -> Rect {
    let centered_x = anchor.x + (anchor.width - width) / 2;
    let centered_y = anchor.y + (anchor.height - height) / 2;
    let (x, y) = match side {
        TooltipSide::Top => (centered_x, anchor.y - height - TOOLTIP_GAP),
        TooltipSide::Bottom => (centered_x, anchor.bottom() + TOOLTIP_GAP),
        TooltipSide::Left => (anchor.x - width - TOOLTIP_GAP, centered_y),
        TooltipSide::Right => (anchor.right() + TOOLTIP_GAP, centered_y),
    };
    Rect::new(
        clamp_axis(x, width, viewport.x, viewport.right(), margin),
        clamp_axis(y, height, viewport.y, viewport.bottom(), margin),
        width,
        height,
    )
}

fn clamp_axis(position: i32, extent: i32, start: i32, end: i32, margin: i32) -> i32 {
    let min = start + margin;
    let max = (end - margin - extent).max(min);
    position.clamp(min, max)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tooltip {
    node: NodeId,
    text: String,
    side: TooltipSide,
}

impl Tooltip {
    pub fn bind(doc: &Document, node: NodeId) -> Self {
        Self {
            node,
            text: text_attr(doc, node, TOOLTIP).unwrap_or_default(),
            side: TooltipSide::parse(doc.attr(node, TOOLTIP_POSITION)),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn side(&self) -> TooltipSide {
        self.side
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTooltip {
    pub anchor: NodeId,
    pub popup: NodeId,
    pub rect: Rect,
}

/// At most one tooltip is visible; showing another replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TooltipLayer {
    active: Option<ActiveTooltip>,
}

impl TooltipLayer {
    pub fn active(&self) -> Option<&ActiveTooltip> {
        self.active.as_ref()
    }

    pub fn show(
        &mut self,
        doc: &mut Document,
        tooltip: &Tooltip,
        anchor: Rect,
        viewport: Rect,
        margin: i32,
    ) -> Option<Rect> {
        if tooltip.text.is_empty() {
            return None;
        }
        self.clear(doc);

        let max_width = (viewport.width - 2 * margin).max(TOOLTIP_PADDING + 1);
        let chars = i32::try_from(tooltip.text.chars().count()).unwrap_or(i32::MAX);
        let width = chars.saturating_add(TOOLTIP_PADDING).min(max_width);
        let inner = (width - TOOLTIP_PADDING).max(1);
        let height = (chars + inner - 1) / inner + TOOLTIP_CHROME_ROWS;
        let rect = place_tooltip(anchor, width, height, viewport, tooltip.side, margin);

        let popup = doc.element(doc.root(), "div");
        doc.set_attr(popup, TOOLTIP_POPUP, "");
        doc.set_attr(popup, "role", "tooltip");
        doc.set_attr(popup, "data-side", tooltip.side.as_str());
        doc.set_text(popup, tooltip.text.clone());

        self.active = Some(ActiveTooltip {
            anchor: tooltip.node,
            popup,
            rect,
        });
        Some(rect)
    }

    /// Removes the tooltip if it belongs to `anchor`.
    pub fn hide(&mut self, doc: &mut Document, anchor: NodeId) -> bool {
        if self.active.as_ref().map(|active| active.anchor) != Some(anchor) {
            return false;
        }
        self.clear(doc)
    }

    fn clear(&mut self, doc: &mut Document) -> bool {
        match self.active.take() {
            Some(active) => {
                doc.remove(active.popup);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalTrigger {
    node: NodeId,
    target: NodeId,
}

impl ModalTrigger {
    pub fn bind(doc: &Document, node: NodeId) -> Option<Self> {
        let selector = text_attr(doc, node, MODAL_TARGET)?;
        let Some(target) = doc.resolve(&selector).filter(|target| doc.has_attr(*target, MODAL)) else {
            tracing::warn!(node = %node, selector = %selector, "modal trigger points at no modal");
            return None;
        };
        Some(Self { node, target })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn target(&self) -> NodeId {
        self.target
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenModal {
    modal: NodeId,
    opened_by: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModalLayer {
    open: Option<OpenModal>,
}

impl ModalLayer {
    pub fn open_modal(&self) -> Option<NodeId> {
        self.open.map(|open| open.modal)
    }

    /// Shows the modal, locks page scroll and focuses its first input.
    pub fn show(&mut self, doc: &mut Document, trigger: &ModalTrigger) -> bool {
        if self.open.is_some() {
            return false;
        }
        doc.show(trigger.target);
        doc.set_scroll_locked(true);
        let descendants = doc.descendants(trigger.target);
        let first_input = descendants
            .iter()
            .copied()
            .find(|node| matches!(doc.tag(*node), "input" | "textarea" | "select") && doc.is_focusable(*node))
            .or_else(|| descendants.iter().copied().find(|node| doc.is_focusable(*node)));
        if let Some(node) = first_input {
            doc.focus(node);
        }
        self.open = Some(OpenModal {
            modal: trigger.target,
            opened_by: trigger.node,
        });
        true
    }

    pub fn hide(&mut self, doc: &mut Document) -> Option<NodeId> {
        let open = self.open.take()?;
        doc.hide(open.modal);
        doc.set_scroll_locked(false);
        doc.focus(open.opened_by);
        Some(open.modal)
    }

    /// Backdrop clicks and `data-modal-close` controls close the modal.
    pub fn click(&mut self, doc: &mut Document, node: NodeId) -> Option<NodeId> {
        let open = self.open?;
        let closes = node == open.modal
            || (doc.has_attr(node, MODAL_CLOSE) && doc.is_ancestor(open.modal, node));
        if closes { self.hide(doc) } else { None }
    }
}
