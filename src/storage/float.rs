//! Serde field helpers that keep non-finite floats intact.
//!
//! JSON has no NaN or infinity, and `serde_json` silently writes them as
//! `null`. Finite values are written as plain numbers; the rest as the
//! strings `"NaN"`, `"inf"` and `"-inf"`.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

pub(crate) trait Float: Copy + Serialize {
    const NAN: Self;
    const INFINITY: Self;
    const NEG_INFINITY: Self;

    fn is_finite(self) -> bool;
    fn is_nan(self) -> bool;
    fn is_sign_positive(self) -> bool;
}

macro_rules! float_impl {
    ($t:ty) => {
        impl Float for $t {
            const NAN: Self = <$t>::NAN;
            const INFINITY: Self = <$t>::INFINITY;
            const NEG_INFINITY: Self = <$t>::NEG_INFINITY;

            fn is_finite(self) -> bool {
                <$t>::is_finite(self)
            }

            fn is_nan(self) -> bool {
                <$t>::is_nan(self)
            }

            fn is_sign_positive(self) -> bool {
                <$t>::is_sign_positive(self)
            }
        }
    };
}

float_impl!(f32);
float_impl!(f64);

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Repr<F> {
    Number(F),
    Text(String),
}

fn encode<F: Float>(value: F) -> Repr<F> {
    if value.is_finite() {
        Repr::Number(value)
    } else if value.is_nan() {
        Repr::Text("NaN".into())
    } else if value.is_sign_positive() {
        Repr::Text("inf".into())
    } else {
        Repr::Text("-inf".into())
    }
}

fn decode<F: Float>(repr: Repr<F>) -> Result<F, String> {
    match repr {
        Repr::Number(v) => Ok(v),
        Repr::Text(s) => match s.as_str() {
            "NaN" => Ok(F::NAN),
            "inf" => Ok(F::INFINITY),
            "-inf" => Ok(F::NEG_INFINITY),
            other => Err(format!("expected a number, \"NaN\", \"inf\" or \"-inf\", found {other:?}")),
        },
    }
}

/// `#[serde(with = "float::scalar")]` for a single float field.
pub(crate) mod scalar {
    use super::*;

    pub(crate) fn serialize<F: Float, S: Serializer>(value: &F, serializer: S) -> Result<S::Ok, S::Error> {
        encode(*value).serialize(serializer)
    }

    pub(crate) fn deserialize<'de, F, D>(deserializer: D) -> Result<F, D::Error>
    where
        F: Float + Deserialize<'de>,
        D: Deserializer<'de>,
    {
        decode(Repr::<F>::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

/// `#[serde(with = "float::seq")]` for a `Vec` of floats.
pub(crate) mod seq {
    use super::*;

    #[allow(clippy::ptr_arg)]
    pub(crate) fn serialize<F: Float, S: Serializer>(values: &Vec<F>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| encode(*v)))
    }

    pub(crate) fn deserialize<'de, F, D>(deserializer: D) -> Result<Vec<F>, D::Error>
    where
        F: Float + Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Vec::<Repr<F>>::deserialize(deserializer)?
            .into_iter()
            .map(decode)
            .collect::<Result<_, _>>()
            .map_err(de::Error::custom)
    }
}
