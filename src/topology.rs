//! Connectivity and placement models consumed by the network layer.

use serde::Serialize;

use crate::node::Node;

/// A 2D coordinate in the environment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Channel model deciding whether one node can transmit to another.
///
/// The check is directed: `in_range(a, b)` asks whether `b` is within
/// `a`'s transmission reach. The network derives an (undirected) edge
/// only when both directions hold.
pub trait ChannelModel {
    fn in_range(&self, from: &Node, to: &Node) -> bool;
}

/// Unit-disc channel: a node reaches everything within its comm range.
#[derive(Debug, Default)]
pub struct UnitDiscModel;

impl ChannelModel for UnitDiscModel {
    fn in_range(&self, from: &Node, to: &Node) -> bool {
        from.position().distance(to.position()) <= from.comm_range()
    }
}

/// Placement environment: which positions exist and which are free.
///
/// Obstacle modeling lives behind this trait; the core only asks the
/// two questions below.
pub trait Environment {
    /// Whether a node may be placed at the given position.
    fn is_free(&self, position: Point) -> bool;

    /// Width and height of the placement area.
    fn bounds(&self) -> (f64, f64);
}

/// Obstacle-free rectangular environment.
#[derive(Debug, Clone)]
pub struct OpenSpace {
    width: f64,
    height: f64,
}

impl OpenSpace {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for OpenSpace {
    fn default() -> Self {
        Self::new(600.0, 600.0)
    }
}

impl Environment for OpenSpace {
    fn is_free(&self, position: Point) -> bool {
        position.x >= 0.0 && position.x <= self.width && position.y >= 0.0 && position.y <= self.height
    }

    fn bounds(&self) -> (f64, f64) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeId, NodeSpec};

    fn node_at(id: u32, x: f64, y: f64, range: f64) -> Node {
        Node::from_spec(NodeId::new(id), NodeSpec::new(), Point::new(x, y), 0.0, range)
    }

    #[test]
    fn test_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance(b), 5.0);
    }

    #[test]
    fn test_unit_disc_is_directed() {
        let model = UnitDiscModel;
        let a = node_at(1, 0.0, 0.0, 100.0);
        let b = node_at(2, 80.0, 0.0, 50.0);
        assert!(model.in_range(&a, &b));
        assert!(!model.in_range(&b, &a));
    }

    #[test]
    fn test_open_space_bounds() {
        let env = OpenSpace::new(100.0, 50.0);
        assert!(env.is_free(Point::new(0.0, 0.0)));
        assert!(env.is_free(Point::new(100.0, 50.0)));
        assert!(!env.is_free(Point::new(101.0, 0.0)));
        assert!(!env.is_free(Point::new(-1.0, 0.0)));
    }
}
