// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::binding::{
    AUTO_SAVE, AUTO_SAVE_INDICATOR, AUTO_SAVE_INTERVAL, SAVE_URL, WidgetDefaults, number_attr,
    text_attr,
};
use crate::dom::Document;
use crate::save::{SaveBody, SaveOutcome, SaveRequest, TokenSource};
use crate::timer::{Debounce, Millis};
use crate::{NodeId, RequestId};

const INDICATOR_TEXT: &str = "Draft saved";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSaveConfig {
    pub endpoint: Option<String>,
    pub interval: Millis,
}

impl AutoSaveConfig {
    /// `data-auto-save` may carry the endpoint itself; `data-save-url` wins
    /// when both are present.
    pub fn from_node(doc: &Document, node: NodeId, defaults: &WidgetDefaults) -> Self {
        Self {
            endpoint: text_attr(doc, node, SAVE_URL).or_else(|| text_attr(doc, node, AUTO_SAVE)),
            interval: number_attr(doc, node, AUTO_SAVE_INTERVAL, defaults.auto_save_interval),
        }
    }
}

/// Saves a form in the background once its fields have been quiet for the
/// configured interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSave {
    form: NodeId,
    config: AutoSaveConfig,
    quiet: Debounce,
    indicator: Option<NodeId>,
    indicator_timer: Debounce,
    in_flight: Option<RequestId>,
}

impl AutoSave {
    pub fn bind(doc: &Document, form: NodeId, defaults: &WidgetDefaults) -> Self {
        let config = AutoSaveConfig::from_node(doc, form, defaults);
        if config.endpoint.is_none() {
            tracing::warn!(node = %form, "auto-save form has no endpoint; nothing will be sent");
        }
        Self {
            form,
            quiet: Debounce::new(config.interval),
            config,
            indicator: None,
            indicator_timer: Debounce::new(defaults.indicator_duration),
            in_flight: None,
        }
    }

    pub fn form(&self) -> NodeId {
        self.form
    }

    pub fn config(&self) -> &AutoSaveConfig {
        &self.config
    }

    pub fn contains(&self, doc: &Document, node: NodeId) -> bool {
        node == self.form || doc.is_ancestor(self.form, node)
    }

    pub fn awaits(&self, request: RequestId) -> bool {
        self.in_flight == Some(request)
    }

    pub fn deadline(&self) -> Option<Millis> {
        match (self.quiet.deadline(), self.indicator_timer.deadline()) {
            (Some(left), Some(right)) => Some(left.min(right)),
            (left, right) => left.or(right),
        }
    }

    /// Any input or change inside the form restarts the quiet period.
    pub fn touch(&mut self, now: Millis) {
        if self.config.endpoint.is_some() {
            self.quiet.schedule(now);
        }
    }

    /// Fires the save once the form has been quiet long enough, and drops
    /// the saved indicator when its display time is over.
    pub fn tick(
        &mut self,
        doc: &mut Document,
        now: Millis,
        next_request: impl FnOnce() -> RequestId,
        tokens: &dyn TokenSource,
    ) -> Option<SaveRequest> {
        if self.indicator_timer.fire(now).is_some()
            && let Some(indicator) = self.indicator.take()
        {
            doc.remove(indicator);
        }

        self.quiet.fire(now)?;
        let endpoint = self.config.endpoint.clone()?;
        let id = next_request();
        self.in_flight = Some(id);
        Some(SaveRequest {
            id,
            origin: self.form,
            endpoint,
            token: tokens.current_token(),
            body: SaveBody::Form {
                fields: serialize_form(doc, self.form),
                auto_save: true,
            },
        })
    }

    /// Shows the transient indicator on success. Failures are only logged;
    /// they never interrupt editing.
    pub fn finish_save(
        &mut self,
        doc: &mut Document,
        request: RequestId,
        outcome: &SaveOutcome,
        now: Millis,
    ) -> bool {
        if !self.awaits(request) {
            tracing::warn!(form = %self.form, request = %request, "ignoring stale auto-save response");
            return false;
        }
        self.in_flight = None;
        if !outcome.succeeded() {
            tracing::warn!(
                form = %self.form,
                reason = outcome.message().unwrap_or("rejected"),
                "auto-save failed"
            );
            return false;
        }

        let indicator = match self.indicator {
            Some(existing) => existing,
            None => {
                let node = doc.element(self.form, "span");
                doc.set_attr(node, AUTO_SAVE_INDICATOR, "");
                doc.set_attr(node, "role", "status");
                doc.set_text(node, INDICATOR_TEXT);
                node
            }
        };
        self.indicator = Some(indicator);
        self.indicator_timer.schedule(now);
        true
    }
}

/// Named, enabled controls of `form` as name/value pairs in document order.
pub fn serialize_form(doc: &Document, form: NodeId) -> Vec<(String, String)> {
    doc.descendants(form)
        .into_iter()
        .filter(|node| matches!(doc.tag(*node), "input" | "textarea" | "select"))
        .filter(|node| !doc.has_attr(*node, "disabled"))
        .filter_map(|node| {
            let name = text_attr(doc, node, "name")?;
            if doc.attr(node, "type") == Some("checkbox") && !doc.has_attr(node, "checked") {
                return None;
            }
            Some((name, doc.value(node).to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{AutoSave, serialize_form};
    use crate::binding::{AUTO_SAVE, AUTO_SAVE_INDICATOR, AUTO_SAVE_INTERVAL, WidgetDefaults};
    use crate::dom::Document;
    use crate::save::{SaveBody, SaveOutcome, SaveResponse, StaticToken};
    use crate::{NodeId, RequestId};

    fn notes_form(doc: &mut Document) -> NodeId {
        let form = doc.element(doc.root(), "form");
        doc.set_attr(form, AUTO_SAVE, "/production/orders/12/draft/");
        doc.set_attr(form, AUTO_SAVE_INTERVAL, "1000");
        let notes = doc.element(form, "textarea");
        doc.set_attr(notes, "name", "notes");
        doc.set_value(notes, "torra média");
        let batch = doc.element(form, "input");
        doc.set_attr(batch, "name", "batch");
        doc.set_value(batch, "L-204");
        form
    }

    #[test]
    fn burst_of_inputs_saves_once_after_quiet_period() {
        let mut doc = Document::new();
        let form = notes_form(&mut doc);
        let mut auto_save = AutoSave::bind(&doc, form, &WidgetDefaults::default());
        let token = StaticToken("tok".to_owned());
        let mut issued = 0_u64;
        let mut requests = Vec::new();

        for (now, typed) in [(0, true), (400, true), (800, true), (1_500, false), (1_799, false), (1_800, false), (5_000, false)] {
            if typed {
                auto_save.touch(now);
            }
            if let Some(request) = auto_save.tick(&mut doc, now, || {
                issued += 1;
                RequestId::new(issued)
            }, &token)
            {
                requests.push((now, request));
            }
        }

        assert_eq!(requests.len(), 1);
        let (fired_at, request) = &requests[0];
        assert_eq!(*fired_at, 1_800);
        assert_eq!(request.token, "tok");
        assert_eq!(
            request.body,
            SaveBody::Form {
                fields: vec![
                    ("notes".to_owned(), "torra média".to_owned()),
                    ("batch".to_owned(), "L-204".to_owned()),
                ],
                auto_save: true,
            }
        );
    }

    #[test]
    fn indicator_appears_and_expires() {
        let mut doc = Document::new();
        let form = notes_form(&mut doc);
        let mut auto_save = AutoSave::bind(&doc, form, &WidgetDefaults::default());
        let token = StaticToken("tok".to_owned());
        auto_save.touch(0);
        let request = auto_save
            .tick(&mut doc, 1_000, || RequestId::new(5), &token)
            .expect("save fires");

        assert!(auto_save.finish_save(
            &mut doc,
            request.id,
            &SaveOutcome::Saved(SaveResponse::ok()),
            1_100
        ));
        assert_eq!(doc.find_by_attr(AUTO_SAVE_INDICATOR).len(), 1);

        auto_save.tick(&mut doc, 3_099, || RequestId::new(6), &token);
        assert_eq!(doc.find_by_attr(AUTO_SAVE_INDICATOR).len(), 1);
        auto_save.tick(&mut doc, 3_100, || RequestId::new(6), &token);
        assert!(doc.find_by_attr(AUTO_SAVE_INDICATOR).is_empty());

        let slots = doc.len();
        auto_save.touch(4_000);
        let again = auto_save
            .tick(&mut doc, 5_000, || RequestId::new(7), &token)
            .expect("second save fires");
        auto_save.finish_save(&mut doc, again.id, &SaveOutcome::Saved(SaveResponse::ok()), 5_100);
        assert_eq!(doc.find_by_attr(AUTO_SAVE_INDICATOR).len(), 1);
        auto_save.tick(&mut doc, 7_100, || RequestId::new(8), &token);
        assert_eq!(doc.len(), slots);
    }

    #[test]
    fn failure_is_silent() {
        let mut doc = Document::new();
        let form = notes_form(&mut doc);
        let mut auto_save = AutoSave::bind(&doc, form, &WidgetDefaults::default());
        auto_save.touch(0);
        let request = auto_save
            .tick(&mut doc, 1_000, || RequestId::new(1), &StaticToken(String::new()))
            .expect("save fires");

        let shown = auto_save.finish_save(
            &mut doc,
            request.id,
            &SaveOutcome::Failed("timeout".to_owned()),
            1_200,
        );

        assert!(!shown);
        assert!(doc.find_by_attr(AUTO_SAVE_INDICATOR).is_empty());
    }

    #[test]
    fn serialize_skips_unnamed_disabled_and_unchecked_controls() {
        let mut doc = Document::new();
        let form = doc.element(doc.root(), "form");
        let unnamed = doc.element(form, "input");
        doc.set_value(unnamed, "x");
        let disabled = doc.element(form, "input");
        doc.set_attr(disabled, "name", "code");
        doc.set_attr(disabled, "disabled", "");
        let unchecked = doc.element(form, "input");
        doc.set_attr(unchecked, "name", "is_active");
        doc.set_attr(unchecked, "type", "checkbox");
        doc.set_value(unchecked, "on");
        let kept = doc.element(form, "select");
        doc.set_attr(kept, "name", "roast");
        doc.set_value(kept, "dark");

        assert_eq!(
            serialize_form(&doc, form),
            vec![("roast".to_owned(), "dark".to_owned())]
        );
    }
}
