//! Affine coordinate transforms pushed by `translate` and `rotate` blocks.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Translate { dx: f64, dy: f64 },
    Rotate { cos: f64, sin: f64 },
}

impl Transform {
    pub fn translate(dx: f64, dy: f64) -> Self {
        Transform::Translate { dx, dy }
    }

    /// Rotation by `degrees`, clockwise in a y-up frame (counter-clockwise on screen).
    pub fn rotate(degrees: f64) -> Self {
        let rad = degrees.to_radians();
        Transform::Rotate {
            cos: rad.cos(),
            sin: rad.sin(),
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            Transform::Translate { dx, dy } => (x + dx, y + dy),
            Transform::Rotate { cos, sin } => (x * cos + y * sin, -x * sin + y * cos),
        }
    }
}

/// Resolve a point through a transform stack, innermost (last pushed) first.
pub fn resolve(stack: &[Transform], x: f64, y: f64) -> (f64, f64) {
    stack
        .iter()
        .rev()
        .fold((x, y), |(x, y), t| t.apply(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn test_single_transforms() {
        assert_eq!(Transform::translate(2.0, -1.0).apply(1.0, 1.0), (3.0, 0.0));
        assert!(close(Transform::rotate(90.0).apply(1.0, 0.0), (0.0, -1.0)));
        assert!(close(Transform::rotate(180.0).apply(1.0, 2.0), (-1.0, -2.0)));
    }

    #[test]
    fn test_innermost_first() {
        // outer translate, inner rotate: rotate first, then translate
        let stack = [Transform::translate(10.0, 0.0), Transform::rotate(90.0)];
        assert!(close(resolve(&stack, 1.0, 0.0), (10.0, -1.0)));

        // outer rotate, inner translate: translate first, then rotate
        let stack = [Transform::rotate(90.0), Transform::translate(10.0, 0.0)];
        assert!(close(resolve(&stack, 1.0, 0.0), (0.0, -11.0)));

        assert_eq!(resolve(&[], 3.0, 4.0), (3.0, 4.0));
    }
}
