use crate::domain::sample::Sample;

/// Where an energy sensor takes its power (kW) reading from.
#[derive(Debug, Clone, PartialEq)]
pub enum PowerSource {
    Direct(String),
    Summed {
        /// Identifies the sensor in logs; not used to resolve the value.
        primary: String,
        fields: Vec<String>,
    },
}

impl PowerSource {
    pub fn direct(field: impl Into<String>) -> Self {
        Self::Direct(field.into())
    }

    pub fn summed<I, S>(primary: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Summed {
            primary: primary.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn primary_field(&self) -> &str {
        match self {
            Self::Direct(field) => field,
            Self::Summed { primary, .. } => primary,
        }
    }

    /// Direct sources yield `None` when the field is absent. Summed sources
    /// count absent terms as zero and always yield a value.
    pub fn read(&self, sample: &Sample) -> Option<f64> {
        match self {
            Self::Direct(field) => sample.get(field),
            Self::Summed { fields, .. } => Some(
                fields
                    .iter()
                    .map(|field| sample.get(field).unwrap_or(0.0))
                    .sum(),
            ),
        }
    }
}
