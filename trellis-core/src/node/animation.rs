//! Animation Nodes
//!
//! An animation samples keyframed channels at a normalized progress.
//!
//! # Interface
//!
//! - input `progress` (Float): position in the animation, 0 to 1
//! - output `duration` (Float): last timestamp over all channels
//! - one output per channel, named after it, of the keyframes' kind
//!
//! # Sampling
//!
//! The local time is `progress * duration`. For each channel we find the
//! keyframes surrounding that time and interpolate between them. Times
//! before the first or after the last keyframe clamp to that keyframe.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::StructuralError;
use crate::property::{Inputs, Outputs, PropertyKind, PropertyTree, TypeSpec, Value};

pub(crate) const PROGRESS: &str = "progress";
pub(crate) const DURATION: &str = "duration";

/// How values between two keyframes are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    /// Hold the earlier keyframe.
    Step,
    /// Componentwise linear interpolation. Integers are rounded.
    Linear,
    /// Linear interpolation of `Vec4f` quaternions, renormalized.
    LinearQuaternion,
}

/// One animated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationChannel {
    pub name: String,
    /// Strictly ascending keyframe times.
    pub timestamps: Vec<f32>,
    /// One value per timestamp, all of the same kind.
    pub keyframes: Vec<Value>,
    pub interpolation: Interpolation,
}

impl AnimationChannel {
    /// Create a new channel.
    pub fn new(
        name: impl Into<String>,
        timestamps: Vec<f32>,
        keyframes: Vec<Value>,
        interpolation: Interpolation,
    ) -> Self {
        Self {
            name: name.into(),
            timestamps,
            keyframes,
            interpolation,
        }
    }

    fn kind(&self) -> Option<PropertyKind> {
        self.keyframes.first().map(Value::kind)
    }

    fn validate(&self) -> Result<PropertyKind, String> {
        if self.name.is_empty() || self.name.contains('.') {
            return Err(format!("invalid channel name '{}'", self.name));
        }
        if self.name == DURATION {
            return Err(format!("channel name '{DURATION}' is reserved"));
        }
        if self.timestamps.is_empty() {
            return Err(format!("channel '{}' has no keyframes", self.name));
        }
        if self.timestamps.len() != self.keyframes.len() {
            return Err(format!(
                "channel '{}' has {} timestamps but {} keyframes",
                self.name,
                self.timestamps.len(),
                self.keyframes.len()
            ));
        }
        if self.timestamps.iter().any(|t| !t.is_finite())
            || self.timestamps.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(format!(
                "channel '{}' timestamps must be finite and strictly ascending",
                self.name
            ));
        }

        let kind = self
            .kind()
            .ok_or_else(|| format!("channel '{}' has no keyframes", self.name))?;
        if !matches!(
            kind,
            PropertyKind::Float
                | PropertyKind::Vec2f
                | PropertyKind::Vec3f
                | PropertyKind::Vec4f
                | PropertyKind::Int32
                | PropertyKind::Vec2i
                | PropertyKind::Vec3i
                | PropertyKind::Vec4i
        ) {
            return Err(format!("channel '{}' cannot animate {kind} values", self.name));
        }
        if self.keyframes.iter().any(|k| k.kind() != kind) {
            return Err(format!("channel '{}' mixes keyframe kinds", self.name));
        }
        if self.interpolation == Interpolation::LinearQuaternion && kind != PropertyKind::Vec4f {
            return Err(format!(
                "channel '{}' uses quaternion interpolation on {kind} keyframes",
                self.name
            ));
        }
        Ok(kind)
    }

    /// Sample the channel at local time `t`.
    pub fn sample(&self, t: f32) -> Value {
        let ts = &self.timestamps;
        let upper_bound = ts.partition_point(|&stamp| stamp <= t);
        let lower = upper_bound.saturating_sub(1);
        let upper = upper_bound.min(ts.len() - 1);

        let ratio = if upper != lower {
            ((t - ts[lower]) / (ts[upper] - ts[lower])).clamp(0.0, 1.0)
        } else {
            0.0
        };

        match self.interpolation {
            Interpolation::Step => self.keyframes[lower].clone(),
            Interpolation::Linear => lerp(&self.keyframes[lower], &self.keyframes[upper], ratio),
            Interpolation::LinearQuaternion => {
                match lerp(&self.keyframes[lower], &self.keyframes[upper], ratio) {
                    Value::Vec4f(q) => Value::Vec4f(normalize(q)),
                    other => other,
                }
            }
        }
    }
}

fn lerp(a: &Value, b: &Value, r: f32) -> Value {
    fn f<const N: usize>(a: &[f32; N], b: &[f32; N], r: f32) -> [f32; N] {
        std::array::from_fn(|i| a[i] + (b[i] - a[i]) * r)
    }
    fn i<const N: usize>(a: &[i32; N], b: &[i32; N], r: f32) -> [i32; N] {
        std::array::from_fn(|k| {
            let (a, b) = (a[k] as f32, b[k] as f32);
            (a + (b - a) * r).round() as i32
        })
    }
    match (a, b) {
        (Value::Float(a), Value::Float(b)) => Value::Float(a + (b - a) * r),
        (Value::Vec2f(a), Value::Vec2f(b)) => Value::Vec2f(f(a, b, r)),
        (Value::Vec3f(a), Value::Vec3f(b)) => Value::Vec3f(f(a, b, r)),
        (Value::Vec4f(a), Value::Vec4f(b)) => Value::Vec4f(f(a, b, r)),
        (Value::Int32(a), Value::Int32(b)) => Value::Int32(i(&[*a], &[*b], r)[0]),
        (Value::Vec2i(a), Value::Vec2i(b)) => Value::Vec2i(i(a, b, r)),
        (Value::Vec3i(a), Value::Vec3i(b)) => Value::Vec3i(i(a, b, r)),
        (Value::Vec4i(a), Value::Vec4i(b)) => Value::Vec4i(i(a, b, r)),
        // validated channels never mix kinds
        _ => a.clone(),
    }
}

fn normalize(q: [f32; 4]) -> [f32; 4] {
    let length = q.iter().map(|c| c * c).sum::<f32>().sqrt();
    if length > 0.0 {
        q.map(|c| c / length)
    } else {
        q
    }
}

/// Node state of an animation.
#[derive(Debug, Clone)]
pub struct AnimationNode {
    channels: Vec<AnimationChannel>,
    duration: f32,
}

impl AnimationNode {
    /// Validate channels and build the node together with its interface.
    pub(crate) fn new(
        channels: Vec<AnimationChannel>,
    ) -> Result<(Self, TypeSpec, TypeSpec), StructuralError> {
        if channels.is_empty() {
            return Err(StructuralError::InvalidAnimation(
                "at least one channel is required".to_string(),
            ));
        }
        let mut names = HashSet::new();
        let mut outputs = vec![(DURATION.to_string(), TypeSpec::leaf(PropertyKind::Float))];
        for channel in &channels {
            let kind = channel.validate().map_err(StructuralError::InvalidAnimation)?;
            if !names.insert(channel.name.as_str()) {
                return Err(StructuralError::InvalidAnimation(format!(
                    "duplicate channel name '{}'",
                    channel.name
                )));
            }
            outputs.push((channel.name.clone(), TypeSpec::leaf(kind)));
        }

        let duration = channels
            .iter()
            .filter_map(|c| c.timestamps.last().copied())
            .fold(0.0f32, f32::max);
        let inputs = TypeSpec::structure([(PROGRESS, TypeSpec::leaf(PropertyKind::Float))]);
        Ok((Self { channels, duration }, inputs, TypeSpec::Struct(outputs)))
    }

    pub fn channels(&self) -> &[AnimationChannel] {
        &self.channels
    }

    /// Length of the animation in the keyframes' time unit.
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Publish the duration output. Done once at creation.
    pub(crate) fn initialize_outputs(&self, outputs: &mut PropertyTree) -> Result<(), StructuralError> {
        let slot = outputs.find(DURATION)?;
        outputs.set_value(slot, Value::Float(self.duration))?;
        outputs.clear_set_flags();
        Ok(())
    }

    pub(crate) fn update(
        &self,
        inputs: Option<&PropertyTree>,
        outputs: Option<&mut PropertyTree>,
    ) -> Result<(), String> {
        let inputs = Inputs::new(inputs);
        let mut outputs = Outputs::new(outputs);

        let progress: f32 = inputs.get(PROGRESS)?;
        let time = progress * self.duration;
        for channel in &self.channels {
            outputs.set(&channel.name, channel.sample(time))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_float() -> AnimationChannel {
        AnimationChannel::new(
            "x",
            vec![0.0, 1.0, 3.0],
            vec![Value::Float(0.0), Value::Float(10.0), Value::Float(30.0)],
            Interpolation::Linear,
        )
    }

    #[test]
    fn linear_sampling_interpolates_and_clamps() {
        let channel = linear_float();
        assert_eq!(channel.sample(-1.0), Value::Float(0.0));
        assert_eq!(channel.sample(0.5), Value::Float(5.0));
        assert_eq!(channel.sample(2.0), Value::Float(20.0));
        assert_eq!(channel.sample(3.0), Value::Float(30.0));
        assert_eq!(channel.sample(7.0), Value::Float(30.0));
    }

    #[test]
    fn step_holds_earlier_keyframe() {
        let channel = AnimationChannel::new(
            "v",
            vec![0.0, 2.0],
            vec![Value::Vec2i([0, 0]), Value::Vec2i([4, 8])],
            Interpolation::Step,
        );
        assert_eq!(channel.sample(1.9), Value::Vec2i([0, 0]));
        assert_eq!(channel.sample(2.0), Value::Vec2i([4, 8]));
    }

    #[test]
    fn integer_interpolation_rounds() {
        let channel = AnimationChannel::new(
            "i",
            vec![0.0, 1.0],
            vec![Value::Int32(0), Value::Int32(3)],
            Interpolation::Linear,
        );
        assert_eq!(channel.sample(0.5), Value::Int32(2));
    }

    #[test]
    fn quaternions_are_normalized() {
        let channel = AnimationChannel::new(
            "q",
            vec![0.0, 1.0],
            vec![
                Value::Vec4f([1.0, 0.0, 0.0, 0.0]),
                Value::Vec4f([0.0, 1.0, 0.0, 0.0]),
            ],
            Interpolation::LinearQuaternion,
        );
        let Value::Vec4f(q) = channel.sample(0.5) else {
            panic!("expected a Vec4f sample");
        };
        let length: f32 = q.iter().map(|c| c * c).sum::<f32>().sqrt();
        assert!((length - 1.0).abs() < 1e-6);
    }

    #[test]
    fn invalid_channels_are_rejected() {
        let mut unsorted = linear_float();
        unsorted.timestamps = vec![0.0, 2.0, 1.0];
        let mut short = linear_float();
        short.keyframes.pop();
        let mut strings = linear_float();
        strings.keyframes = vec![Value::from("a"), Value::from("b"), Value::from("c")];
        let mut quaternion = linear_float();
        quaternion.interpolation = Interpolation::LinearQuaternion;

        for channel in [unsorted, short, strings, quaternion] {
            assert!(matches!(
                AnimationNode::new(vec![channel]),
                Err(StructuralError::InvalidAnimation(_))
            ));
        }
        assert!(AnimationNode::new(vec![linear_float(), linear_float()]).is_err());
        assert!(AnimationNode::new(Vec::new()).is_err());
    }

    #[test]
    fn update_samples_at_progress() {
        let (node, inputs_spec, outputs_spec) = AnimationNode::new(vec![linear_float()]).unwrap();
        assert_eq!(node.duration(), 3.0);

        let mut inputs = PropertyTree::build(&inputs_spec).unwrap();
        let mut outputs = PropertyTree::build(&outputs_spec).unwrap();
        node.initialize_outputs(&mut outputs).unwrap();
        assert_eq!(outputs.value(outputs.find(DURATION).unwrap()).unwrap(), &Value::Float(3.0));

        inputs.set_value(inputs.find(PROGRESS).unwrap(), Value::Float(0.5)).unwrap();
        node.update(Some(&inputs), Some(&mut outputs)).unwrap();
        assert_eq!(outputs.value(outputs.find("x").unwrap()).unwrap(), &Value::Float(15.0));
    }
}
