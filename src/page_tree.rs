use std::collections::HashSet;

use log::{debug, warn};

use crate::{Dictionary, Document, Object, ObjectId, Rect};

/// A leaf of the page tree with its inheritable attributes flattened.
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    /// Id of the page dictionary, `None` when the page is a direct object.
    pub id: Option<ObjectId>,
    pub dict: Dictionary<'a>,
    /// The page's own `/Resources`, or the nearest ancestor's.
    pub resources: Option<Dictionary<'a>>,
    pub media_box: Rect,
    pub crop_box: Rect,
    /// Clockwise rotation in degrees: 0, 90, 180 or 270.
    pub rotate: i64,
}

/// Attributes a page tree node passes down to its descendants.
#[derive(Clone, Copy, Default)]
struct Inherited<'a> {
    resources: Option<Dictionary<'a>>,
    media_box: Option<Rect>,
    crop_box: Option<Rect>,
    rotate: Option<i64>,
}

impl<'a> Inherited<'a> {
    fn apply(mut self, document: &Document<'a>, node: Dictionary<'a>) -> Inherited<'a> {
        if let Ok(resources) = document.get(node, b"Resources", None).as_dict() {
            self.resources = Some(resources);
        }
        if let Some(media_box) = rect(document, node, b"MediaBox") {
            self.media_box = Some(media_box);
        }
        if let Some(crop_box) = rect(document, node, b"CropBox") {
            self.crop_box = Some(crop_box);
        }
        if let Ok(rotate) = document.get(node, b"Rotate", None).as_number() {
            self.rotate = Some(rotate as i64);
        }
        self
    }

    fn page(self, id: Option<ObjectId>, dict: Dictionary<'a>) -> Page<'a> {
        let media_box = self.media_box.unwrap_or_else(Rect::empty);
        Page {
            id,
            dict,
            resources: self.resources,
            media_box,
            crop_box: self.crop_box.unwrap_or(media_box),
            rotate: normalize_rotation(self.rotate.unwrap_or(0)),
        }
    }
}

fn rect<'a>(document: &Document<'a>, node: Dictionary<'a>, key: &[u8]) -> Option<Rect> {
    let array = document.get(node, key, None).as_array().ok()?;
    let values = array.iter().map(|value| *document.resolve_reference(value)).collect::<Vec<_>>();
    match Rect::from_array(&values) {
        Ok(rect) => Some(rect),
        Err(err) => {
            warn!("Ignoring /{}: {}", String::from_utf8_lossy(key), err);
            None
        }
    }
}

/// Round to the nearest quarter turn in `[0, 360)`.
fn normalize_rotation(degrees: i64) -> i64 {
    let quarter_turns = (degrees as f64 / 90.0).round() as i64;
    quarter_turns.rem_euclid(4) * 90
}

/// Intermediate nodes are typed `/Pages`, or untyped with a `/Kids` array.
fn is_intermediate(node: Dictionary, kids: &Object) -> bool {
    node.type_is(b"Pages") || (!node.has(b"Type") && kids.is_array())
}

fn is_leaf(node: Dictionary) -> bool {
    node.type_is(b"Page") || !node.has(b"Type")
}

/// Walk the page tree under the catalog's `/Pages` depth-first and return the
/// leaves in document order.
///
/// Every indirect node is visited at most once, so a node that turns up again
/// (as its own ancestor, or twice in some `/Kids`) is skipped with a warning.
pub(crate) fn collect_pages<'a>(document: &Document<'a>, catalog: Dictionary<'a>) -> Vec<Page<'a>> {
    let mut pages = Vec::new();
    let Ok(root) = catalog.get(b"Pages") else {
        warn!("Document catalog has no /Pages");
        return pages;
    };

    let mut visited = HashSet::new();
    let mut stack = vec![(root, Inherited::default())];
    while let Some((node, inherited)) = stack.pop() {
        let id = match node {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        if let Some(id) = id {
            if !visited.insert(id) {
                warn!("Page tree node {} {} R was already visited, skipping it", id.0, id.1);
                continue;
            }
        }

        let dict = match document.resolve_reference(node).as_dict() {
            Ok(dict) => dict,
            Err(err) => {
                warn!("Skipping page tree node {:?}: {}", node, err);
                continue;
            }
        };
        let inherited = inherited.apply(document, dict);

        let kids = document.get(dict, b"Kids", None);
        if is_intermediate(dict, kids) {
            if let Ok(kids) = kids.as_array() {
                stack.extend(kids.iter().rev().map(|kid| (kid, inherited)));
            }
        } else if is_leaf(dict) {
            pages.push(inherited.page(id, dict));
        } else {
            warn!("Skipping page tree node of type {:?}", dict.type_name().unwrap_or("?"));
        }
    }

    debug!("Page tree has {} pages", pages.len());
    pages
}
