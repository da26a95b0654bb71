use std::collections::HashSet;

use crate::{
    config::MonitorConfig,
    detect::DetectedObject,
    models::{EventKind, Violation},
};

/// Filters detected objects against the prohibited-item set. Repeated
/// presence re-fires every cycle; sustained violations are deliberately
/// over-reported rather than silently suppressed.
pub struct ObjectPolicy {
    prohibited: HashSet<String>,
}

impl ObjectPolicy {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            prohibited: config.prohibited_items.iter().cloned().collect(),
        }
    }

    pub fn inspect(&self, objects: &[DetectedObject]) -> Vec<Violation> {
        objects
            .iter()
            .filter(|object| self.prohibited.contains(&object.label))
            .map(|object| Violation {
                kind: EventKind::SuspiciousItem,
                message: format!("{} detected", object.label),
                alert_message: format!("Suspicious item: {}", object.label),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use pretty_assertions::assert_eq;

    fn object(label: &str) -> DetectedObject {
        DetectedObject {
            label: label.into(),
            bbox: BoundingBox::default(),
        }
    }

    #[test]
    fn prohibited_label_fires_once_per_object() {
        let policy = ObjectPolicy::new(&MonitorConfig::default());
        let fired = policy.inspect(&[object("cell phone")]);

        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].kind, EventKind::SuspiciousItem);
        assert_eq!(fired[0].message, "cell phone detected");
        assert_eq!(fired[0].alert_message, "Suspicious item: cell phone");
    }

    #[test]
    fn unlisted_label_is_ignored() {
        let policy = ObjectPolicy::new(&MonitorConfig::default());
        assert_eq!(policy.inspect(&[object("cup")]), vec![]);
    }

    #[test]
    fn each_matching_object_fires_separately() {
        let policy = ObjectPolicy::new(&MonitorConfig::default());
        let fired = policy.inspect(&[
            object("cell phone"),
            object("book"),
            object("cup"),
            object("cell phone"),
        ]);

        assert_eq!(fired.len(), 3);
    }

    #[test]
    fn match_is_label_exact() {
        let policy = ObjectPolicy::new(&MonitorConfig::default());
        assert_eq!(policy.inspect(&[object("Cell Phone")]), vec![]);
    }
}
