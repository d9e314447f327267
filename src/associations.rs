//! Bounded association tables.
//!
//! The host presents device lists (inputs, applications, remote keys) as integer-valued
//! selections. Each table starts with the `(-1, "-")` "nothing selected" entry, followed by one
//! entry per device item in device order. Hosts limit the number of entries, so tables longer than
//! the cap are truncated and the dropped labels are logged.

use log::info;

pub const NONE_SELECTED_VALUE: i64 = -1;
pub const NONE_SELECTED_LABEL: &str = "-";

/// Something with a display label.
pub trait Labelled {
    fn label(&self) -> &str;
}

/// The device list an [`AssociationTable`] was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssociationKind {
    InputSource,
    Application,
    RemoteKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Association {
    pub value: i64,
    pub label: String,
}

/// An ordered value/label table, sentinel first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AssociationTable {
    pub entries: Vec<Association>,
    /// Labels that did not fit under the cap, in device order.
    pub dropped: Vec<String>,
}

impl AssociationTable {
    pub fn label_of(&self, value: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|association| association.value == value)
            .map(|association| association.label.as_str())
    }
}

/// Build the association table for `items`, keeping at most `cap` entries (sentinel included).
pub fn build_association_table<T: Labelled>(
    kind: AssociationKind,
    items: &[T],
    cap: usize,
) -> AssociationTable {
    let mut entries = Vec::with_capacity(items.len() + 1);

    entries.push(Association {
        value: NONE_SELECTED_VALUE,
        label: NONE_SELECTED_LABEL.to_string(),
    });

    entries.extend(items.iter().enumerate().map(|(index, item)| Association {
        value: index as i64,
        label: decode_html_entities(item.label()),
    }));

    let cap = cap.max(1);
    let mut dropped = Vec::new();

    if entries.len() > cap {
        dropped = entries
            .split_off(cap)
            .into_iter()
            .map(|association| association.label)
            .collect();

        info!(
            "{:?} list exceeds {} entries; dropping {} entries: {}",
            kind,
            cap,
            dropped.len(),
            dropped.join(", ")
        );
    }

    AssociationTable { entries, dropped }
}

/// Decode HTML character references (named and numeric) in a device-supplied label. Unknown
/// references and bare `&` are kept verbatim.
pub(crate) fn decode_html_entities(label: &str) -> String {
    html_escape::decode_html_entities(label).into_owned()
}

// ================================================================================================
// Tests
