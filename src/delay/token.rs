//! Values that flow through delay elements.

/// A value that can be linearly interpolated between two samples.
///
/// `interpolate` returns `self + (right - self) / run * offset`, where
/// `run` is the time gap between the two samples and `offset` the
/// distance from `self` to the point being estimated, both in model
/// seconds. Callers guarantee `run > 0`.
pub trait Interpolate: Clone {
    fn interpolate(&self, right: &Self, run: f64, offset: f64) -> Self;
}

impl Interpolate for f64 {
    fn interpolate(&self, right: &Self, run: f64, offset: f64) -> Self {
        self + (right - self) / run * offset
    }
}

impl Interpolate for f32 {
    fn interpolate(&self, right: &Self, run: f64, offset: f64) -> Self {
        (*self as f64).interpolate(&(*right as f64), run, offset) as f32
    }
}

impl<const N: usize> Interpolate for [f64; N] {
    fn interpolate(&self, right: &Self, run: f64, offset: f64) -> Self {
        let mut out = *self;
        for (o, r) in out.iter_mut().zip(right.iter()) {
            *o = o.interpolate(r, run, offset);
        }
        out
    }
}

/// Wrapper for values that have no arithmetic.
///
/// Interpolating a `Hold` keeps the left sample (zero-order hold).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Hold<T>(pub T);

impl<T: Clone> Interpolate for Hold<T> {
    fn interpolate(&self, _right: &Self, _run: f64, _offset: f64) -> Self {
        self.clone()
    }
}

/// The state of an input port for one firing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Signal<V> {
    /// Nothing is known about the input yet.
    Unknown,
    /// The input is known to carry no value.
    Absent,
    Present(V),
}

impl<V> Signal<V> {
    /// The carried value, if present.
    pub fn into_value(self) -> Option<V> {
        match self {
            Signal::Present(v) => Some(v),
            Signal::Unknown | Signal::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Signal::Present(_))
    }
}

impl<V> Default for Signal<V> {
    fn default() -> Self {
        Signal::Unknown
    }
}

impl<V> From<Option<V>> for Signal<V> {
    fn from(value: Option<V>) -> Self {
        match value {
            Some(v) => Signal::Present(v),
            None => Signal::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_interpolation() {
        assert_eq!(0.0f64.interpolate(&10.0, 2.0, 0.5), 2.5);
        assert_eq!(1.0f32.interpolate(&3.0, 1.0, 0.5), 2.0);
        assert_eq!([0.0, 10.0].interpolate(&[4.0, 0.0], 4.0, 1.0), [1.0, 7.5]);
    }

    #[test]
    fn test_hold_keeps_left() {
        let left = Hold("low");
        assert_eq!(left.interpolate(&Hold("high"), 1.0, 0.9), Hold("low"));
    }

    #[test]
    fn test_signal() {
        assert_eq!(Signal::<i32>::default(), Signal::Unknown);
        assert_eq!(Signal::from(Some(3)).into_value(), Some(3));
        assert!(!Signal::<i32>::from(None).is_present());
        assert_eq!(Signal::<i32>::Absent.into_value(), None);
    }
}
