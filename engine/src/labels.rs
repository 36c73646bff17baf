use std::collections::BTreeMap;

/// Create labels that can be used as a unique selector for a given app name.
pub fn selector_labels(app: &str) -> Option<BTreeMap<String, String>> {
    Some(BTreeMap::from_iter(vec![(
        "app".to_owned(),
        app.to_owned(),
    )]))
}

/// Managed by label
pub const MANAGED_BY_LABEL_SELECTOR: &str = "managed-by=kubench";

/// Labels that indicate the resource was created by kubench.
///
/// Every object this tool creates carries these, so external cleanup can
/// enumerate and remove leftovers even after an abnormal exit.
pub fn managed_labels() -> Option<BTreeMap<String, String>> {
    Some(BTreeMap::from_iter(vec![(
        "managed-by".to_owned(),
        "kubench".to_owned(),
    )]))
}

/// Managed labels merged with extra labels.
pub fn managed_labels_extend(
    extra: Option<BTreeMap<String, String>>,
) -> Option<BTreeMap<String, String>> {
    let mut labels = managed_labels();
    if let (Some(labels), Some(extra)) = (labels.as_mut(), extra) {
        labels.extend(extra);
    }
    labels
}
