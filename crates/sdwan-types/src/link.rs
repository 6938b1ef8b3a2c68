//! Directed links and paths.

use crate::{ConnectPoint, DeviceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A directed infrastructure link between two connect points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub src: ConnectPoint,
    pub dst: ConnectPoint,
}

impl Link {
    /// Creates a link from `src` to `dst`.
    pub fn new(src: ConnectPoint, dst: ConnectPoint) -> Self {
        Self { src, dst }
    }

    /// Returns the same link traversed in the opposite direction.
    pub fn reversed(&self) -> Link {
        Link::new(self.dst.clone(), self.src.clone())
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// An ordered sequence of links from a source device to a destination device.
///
/// A path with zero links is valid and means source and destination are the
/// same device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    links: Vec<Link>,
}

impl Path {
    /// Creates a path from its links.
    pub fn new(links: Vec<Link>) -> Self {
        Self { links }
    }

    /// Creates a path with no links.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the links of this path in order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Returns the number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns true if the path has no links.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Returns the device the first link leaves from.
    pub fn src_device(&self) -> Option<&DeviceId> {
        self.links.first().map(|l| l.src.device_id())
    }

    /// Returns the device the last link arrives at.
    pub fn dst_device(&self) -> Option<&DeviceId> {
        self.links.last().map(|l| l.dst.device_id())
    }

    /// Returns true if every link starts on the device the previous one ends on.
    pub fn is_contiguous(&self) -> bool {
        self.links
            .windows(2)
            .all(|w| w[0].dst.device_id() == w[1].src.device_id())
    }

    /// Returns the path walked backwards: link order reversed and every
    /// link flipped.
    pub fn reversed(&self) -> Path {
        Path::new(self.links.iter().rev().map(Link::reversed).collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.links.is_empty() {
            return f.write_str("[]");
        }
        f.write_str("[")?;
        for (i, link) in self.links.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", link)?;
        }
        f.write_str("]")
    }
}

impl FromIterator<Link> for Path {
    fn from_iter<I: IntoIterator<Item = Link>>(iter: I) -> Self {
        Path::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn link(src: &str, dst: &str) -> Link {
        Link::new(src.parse().unwrap(), dst.parse().unwrap())
    }

    #[test]
    fn test_path_endpoints() {
        let path = Path::new(vec![link("of:1/2", "of:2/1"), link("of:2/3", "of:3/1")]);
        assert_eq!(path.src_device().unwrap().as_str(), "of:1");
        assert_eq!(path.dst_device().unwrap().as_str(), "of:3");
        assert!(path.is_contiguous());
        assert_eq!(Path::empty().src_device(), None);
    }

    #[test]
    fn test_path_reversed() {
        let path = Path::new(vec![link("of:1/2", "of:2/1"), link("of:2/3", "of:3/1")]);
        let back = path.reversed();
        assert_eq!(
            back,
            Path::new(vec![link("of:3/1", "of:2/3"), link("of:2/1", "of:1/2")])
        );
        assert_eq!(back.reversed(), path);
    }

    #[test]
    fn test_non_contiguous_path() {
        let path = Path::new(vec![link("of:1/2", "of:2/1"), link("of:9/3", "of:3/1")]);
        assert!(!path.is_contiguous());
    }

    #[test]
    fn test_display() {
        let path = Path::new(vec![link("of:1/2", "of:2/1")]);
        assert_eq!(path.to_string(), "[of:1/2 -> of:2/1]");
        assert_eq!(Path::empty().to_string(), "[]");
    }
}
