use std::collections::BTreeMap;

/// Collection of labels a listed object must carry.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MatchLabels(BTreeMap<String, String>);

impl MatchLabels {
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        MatchLabels(labels)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Prints a label selector that matches all labels in the set.
    pub fn selector(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}=={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Joins the set with an already written selector expression.
    pub fn merge_into(&self, label_selector: &str) -> String {
        match (label_selector.is_empty(), self.is_empty()) {
            (_, true) => label_selector.to_string(),
            (true, false) => self.selector(),
            (false, false) => format!("{label_selector},{}", self.selector()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::MatchLabels;
    use std::collections::BTreeMap;

    fn labels() -> MatchLabels {
        MatchLabels::new(BTreeMap::from([
            ("app.kubernetes.io/name".to_string(), "web".to_string()),
            ("app.kubernetes.io/managed-by".to_string(), "helm".to_string()),
        ]))
    }

    #[test]
    fn selector() {
        assert_eq!(
            "app.kubernetes.io/managed-by==helm,app.kubernetes.io/name==web",
            labels().selector()
        );
        assert_eq!("", MatchLabels::default().selector());
    }

    #[test]
    fn merge_into() {
        assert_eq!("tier!=db", MatchLabels::default().merge_into("tier!=db"));
        assert_eq!(labels().selector(), labels().merge_into(""));
        assert_eq!(
            "tier!=db,app.kubernetes.io/managed-by==helm,app.kubernetes.io/name==web",
            labels().merge_into("tier!=db")
        );
    }
}
