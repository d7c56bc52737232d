//! Status display boundary.
//!
//! Plugins never draw pixels. They place pre-rendered icons, keyed by name,
//! into the host's element map; the host compositor renders them on its own
//! refresh cycle. Every read-modify-write on the element map runs inside
//! [`StatusDisplay::with_elements`], which holds the display's lock so it
//! cannot interleave with a redraw.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::defaults::{ICONS_DIR, ICON_SIZE};
use crate::lock;

/// Pre-rendered icon assets shipped in [`ICONS_DIR`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconAsset {
    /// Feedback enabled
    Vibrate,
    /// Feedback disabled (blank placeholder of the same size)
    Empty,
}

impl IconAsset {
    pub fn for_state(active: bool) -> Self {
        if active {
            IconAsset::Vibrate
        } else {
            IconAsset::Empty
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            IconAsset::Vibrate => "vibrate.png",
            IconAsset::Empty => "empty.png",
        }
    }

    /// Path relative to the plugin directory.
    pub fn path(self) -> String {
        format!("{}/{}", ICONS_DIR, self.file_name())
    }
}

/// One placed icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Icon {
    pub asset: IconAsset,
    /// Top-left corner in display pixels
    pub position: (i32, i32),
    /// Render light-on-dark instead of dark-on-light
    pub inverted: bool,
    /// Edge length in pixels
    pub size: u32,
}

impl Icon {
    pub fn new(asset: IconAsset, position: (i32, i32), inverted: bool) -> Self {
        Self {
            asset,
            position,
            inverted,
            size: ICON_SIZE,
        }
    }
}

/// Top-centre icon slot for a display `width` pixels wide.
pub fn icon_origin(width: u32) -> (i32, i32) {
    ((width / 2) as i32 - 5, 0)
}

/// Keyed element map. Adding under an existing key replaces the element.
pub trait ElementMap {
    fn add_element(&mut self, key: &str, icon: Icon);
    /// Returns whether an element was removed.
    fn remove_element(&mut self, key: &str) -> bool;
    fn has_element(&self, key: &str) -> bool;
}

impl ElementMap for BTreeMap<String, Icon> {
    fn add_element(&mut self, key: &str, icon: Icon) {
        self.insert(key.to_string(), icon);
    }

    fn remove_element(&mut self, key: &str) -> bool {
        self.remove(key).is_some()
    }

    fn has_element(&self, key: &str) -> bool {
        self.contains_key(key)
    }
}

/// Host display as seen by a plugin.
pub trait StatusDisplay: Send + Sync {
    /// Display width in pixels.
    fn width(&self) -> u32;

    /// Run `f` with exclusive access to the element map.
    fn with_elements(&self, f: &mut dyn FnMut(&mut dyn ElementMap));
}

/// Element map with no renderer behind it. Used by the dry-run host and
/// tests to observe what a plugin placed.
pub struct MemoryDisplay {
    width: u32,
    elements: Mutex<BTreeMap<String, Icon>>,
}

impl MemoryDisplay {
    pub fn new(width: u32) -> Self {
        Self {
            width,
            elements: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn element(&self, key: &str) -> Option<Icon> {
        lock(&self.elements).get(key).copied()
    }

    pub fn len(&self) -> usize {
        lock(&self.elements).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.elements).is_empty()
    }
}

impl StatusDisplay for MemoryDisplay {
    fn width(&self) -> u32 {
        self.width
    }

    fn with_elements(&self, f: &mut dyn FnMut(&mut dyn ElementMap)) {
        let mut elements = lock(&self.elements);
        f(&mut *elements);
    }
}
