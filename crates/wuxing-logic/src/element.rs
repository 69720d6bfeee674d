//! The five elements, polarity, and the fixed-size per-element map.
//!
//! All energy bookkeeping in the engine is keyed by [`Element`]. Instead of a
//! string-keyed dictionary, values live in an [`ElementMap`], a `[T; 5]`
//! indexed by the enum, so "every element has a slot" is a type guarantee.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// One of the five elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    Wood,
    Fire,
    Earth,
    Metal,
    Water,
}

impl Element {
    /// All elements in generation order, starting from wood.
    pub fn all() -> [Element; 5] {
        [
            Element::Wood,
            Element::Fire,
            Element::Earth,
            Element::Metal,
            Element::Water,
        ]
    }

    /// Position of this element in [`Element::all`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// The element this one generates (wood → fire → earth → metal → water → wood).
    pub fn generates(self) -> Element {
        match self {
            Element::Wood => Element::Fire,
            Element::Fire => Element::Earth,
            Element::Earth => Element::Metal,
            Element::Metal => Element::Water,
            Element::Water => Element::Wood,
        }
    }

    /// The element this one controls (wood → earth → water → fire → metal → wood).
    pub fn controls(self) -> Element {
        match self {
            Element::Wood => Element::Earth,
            Element::Earth => Element::Water,
            Element::Water => Element::Fire,
            Element::Fire => Element::Metal,
            Element::Metal => Element::Wood,
        }
    }

    /// The element that generates this one.
    pub fn generated_by(self) -> Element {
        match self {
            Element::Wood => Element::Water,
            Element::Fire => Element::Wood,
            Element::Earth => Element::Fire,
            Element::Metal => Element::Earth,
            Element::Water => Element::Metal,
        }
    }

    /// The element that controls this one.
    pub fn controlled_by(self) -> Element {
        match self {
            Element::Wood => Element::Metal,
            Element::Fire => Element::Water,
            Element::Earth => Element::Wood,
            Element::Metal => Element::Fire,
            Element::Water => Element::Earth,
        }
    }

    /// Lowercase English name, also used as the serialized key.
    pub fn name(self) -> &'static str {
        match self {
            Element::Wood => "wood",
            Element::Fire => "fire",
            Element::Earth => "earth",
            Element::Metal => "metal",
            Element::Water => "water",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Yin/yang polarity carried by every stem and branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Yang,
    Yin,
}

/// A value for each of the five elements.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElementMap<T>(pub [T; 5]);

impl<T: Copy> ElementMap<T> {
    /// A map holding `value` for every element.
    pub fn splat(value: T) -> Self {
        Self([value; 5])
    }
}

impl<T> ElementMap<T> {
    /// Build a map by evaluating `f` for each element.
    pub fn from_fn(mut f: impl FnMut(Element) -> T) -> Self {
        Self(Element::all().map(&mut f))
    }

    /// Iterate `(element, &value)` pairs in generation order.
    pub fn iter(&self) -> impl Iterator<Item = (Element, &T)> {
        Element::all().into_iter().zip(self.0.iter())
    }

    /// Transform every value, keeping the element keys.
    pub fn map<U>(&self, mut f: impl FnMut(Element, &T) -> U) -> ElementMap<U> {
        ElementMap::from_fn(|e| f(e, &self.0[e.index()]))
    }
}

impl ElementMap<f64> {
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        self.total() / 5.0
    }
}

impl<T> Index<Element> for ElementMap<T> {
    type Output = T;

    fn index(&self, element: Element) -> &T {
        &self.0[element.index()]
    }
}

impl<T> IndexMut<Element> for ElementMap<T> {
    fn index_mut(&mut self, element: Element) -> &mut T {
        &mut self.0[element.index()]
    }
}

/// Serialized as `{ "wood": .., "fire": .., ... }` so consumers see named keys.
impl<T: Serialize> Serialize for ElementMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        for (element, value) in self.iter() {
            map.serialize_entry(element.name(), value)?;
        }
        map.end()
    }
}
