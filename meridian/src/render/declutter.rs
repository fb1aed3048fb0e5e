//! Screen space index of placed labels and icons.

use std::collections::HashSet;

use meridian_types::cartesian::Rect;
use rstar::{RTree, RTreeObject, AABB};

use crate::feature::FeatureKey;

/// Box of a placed declutter item.
#[derive(Debug, Clone)]
pub struct DeclutterItem {
    /// Screen box of the item in device pixels.
    pub bounds: Rect,
    /// Feature the item belongs to.
    pub feature: FeatureKey,
}

impl RTreeObject for DeclutterItem {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.x_min(), self.bounds.y_min()],
            [self.bounds.x_max(), self.bounds.y_max()],
        )
    }
}

/// R-tree of the screen boxes of labels and icons placed in the current frame.
///
/// Items are placed greedily: an item colliding with an already placed one is skipped.
#[derive(Debug, Default)]
pub struct DeclutterTree {
    tree: RTree<DeclutterItem>,
}

impl DeclutterTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all placed items.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    /// Returns true if the box overlaps any placed item. Touching edges do not collide.
    pub fn collides(&self, bounds: &Rect) -> bool {
        let envelope = AABB::from_corners(
            [bounds.x_min(), bounds.y_min()],
            [bounds.x_max(), bounds.y_max()],
        );

        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .any(|item| boxes_overlap(bounds, &item.bounds))
    }

    /// Places the item if it does not collide with the placed ones. Returns true if the item was placed.
    pub fn try_insert(&mut self, bounds: Rect, feature: FeatureKey) -> bool {
        if self.collides(&bounds) {
            return false;
        }

        self.tree.insert(DeclutterItem { bounds, feature });
        true
    }

    /// Keys of all features that have at least one placed item.
    pub fn features(&self) -> HashSet<FeatureKey> {
        self.tree.iter().map(|item| item.feature.clone()).collect()
    }

    /// Number of placed items.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns true if nothing is placed.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

fn boxes_overlap(a: &Rect, b: &Rect) -> bool {
    a.x_min() < b.x_max() && a.x_max() > b.x_min() && a.y_min() < b.y_max() && a.y_max() > b.y_min()
}
