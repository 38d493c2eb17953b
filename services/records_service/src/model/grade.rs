use std::fmt::{Display, Formatter};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

const UNGRADED: &str = "Ungraded";

/// A student's aggregate grade in a course. Stored as a number, or as the string `"Ungraded"`
/// while no submission of theirs has been graded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CourseGrade {
    Ungraded,
    Graded(f64),
}

impl CourseGrade {
    /// Mean of `grades`, or `Ungraded` when there are none.
    pub fn mean(grades: &[f64]) -> Self {
        if grades.is_empty() {
            return CourseGrade::Ungraded;
        }

        CourseGrade::Graded(grades.iter().sum::<f64>() / grades.len() as f64)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            CourseGrade::Ungraded => None,
            CourseGrade::Graded(v) => Some(*v),
        }
    }
}

impl Default for CourseGrade {
    fn default() -> Self {
        CourseGrade::Ungraded
    }
}

impl Display for CourseGrade {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CourseGrade::Ungraded => f.write_str(UNGRADED),
            CourseGrade::Graded(v) => write!(f, "{:.2}", v),
        }
    }
}

impl Serialize for CourseGrade {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            CourseGrade::Ungraded => serializer.serialize_str(UNGRADED),
            CourseGrade::Graded(v) => serializer.serialize_f64(*v),
        }
    }
}

impl<'de> Deserialize<'de> for CourseGrade {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(CourseGrade::Graded(v)),
            Raw::Text(s) if s == UNGRADED => Ok(CourseGrade::Ungraded),
            Raw::Text(s) => Err(de::Error::custom(format!("invalid course grade {:?}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::{json, Value};

    use super::*;

    #[rstest]
    #[case(&[], CourseGrade::Ungraded)]
    #[case(&[90.0, 70.0], CourseGrade::Graded(80.0))]
    #[case(&[100.0], CourseGrade::Graded(100.0))]
    #[case(&[0.0, 0.0], CourseGrade::Graded(0.0))]
    fn mean(#[case] grades: &[f64], #[case] expected: CourseGrade) {
        assert_eq!(expected, CourseGrade::mean(grades));
    }

    #[rstest]
    #[case(CourseGrade::Ungraded, json!("Ungraded"))]
    #[case(CourseGrade::Graded(87.5), json!(87.5))]
    fn stored_form(#[case] grade: CourseGrade, #[case] stored: Value) {
        assert_eq!(stored, serde_json::to_value(grade).unwrap());
        assert_eq!(grade, serde_json::from_value::<CourseGrade>(stored).unwrap());
    }

    #[test]
    fn integral_numbers_are_grades() {
        assert_eq!(
            CourseGrade::Graded(90.0),
            serde_json::from_value::<CourseGrade>(json!(90)).unwrap()
        );
    }

    #[test]
    fn unknown_text_is_rejected() {
        assert!(serde_json::from_value::<CourseGrade>(json!("A+")).is_err());
    }
}
