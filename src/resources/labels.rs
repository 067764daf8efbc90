use crate::constants::{
    LABEL_INSTALLATION_UID, LABEL_INTEGREATLY, LABEL_MONITORING_KEY, LABEL_USER_MONITORING,
    MONITORING_KEY_VALUE,
};
use crate::Rhmi;
use kube::api::ObjectMeta;
use kube::ResourceExt;

/// Apply the ownership and monitoring labels of `owner`, returning whether any changed
pub fn prepare_object_labels(metadata: &mut ObjectMeta, owner: &Rhmi) -> bool {
    let wanted = [
        (LABEL_INTEGREATLY, "true".to_string()),
        (LABEL_INSTALLATION_UID, owner.uid().unwrap_or_default()),
        (LABEL_MONITORING_KEY, MONITORING_KEY_VALUE.to_string()),
        (LABEL_USER_MONITORING, "false".to_string()),
    ];
    let labels = metadata.labels.get_or_insert_with(Default::default);
    let mut changed = false;
    for (key, value) in wanted {
        if labels.get(key) != Some(&value) {
            labels.insert(key.to_string(), value);
            changed = true;
        }
    }
    changed
}

/// Whether the object carries the installation uid label of `owner`
pub fn is_owned_by(metadata: &ObjectMeta, owner: &Rhmi) -> bool {
    let Some(uid) = owner.uid() else {
        return false;
    };
    metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(LABEL_INSTALLATION_UID))
        .is_some_and(|v| *v == uid)
}
