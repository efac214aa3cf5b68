// SPDX-License-Identifier: MIT OR Apache-2.0
//! Challenge pages: static answer keys and answer checking.
//!
//! Checks are pure and stateless. A rejected answer carries the challenge
//! hint; nothing here touches the robots.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Access modifier a field can be given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessModifier {
    /// Visible everywhere
    Public,
    /// Visible to the class only
    Private,
    /// Visible to the class and subclasses
    Protected,
}

impl AccessModifier {
    /// Parse a keyword, ignoring case and surrounding whitespace
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            "protected" => Some(Self::Protected),
            _ => None,
        }
    }
}

/// How a challenge decides whether an answer is right
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnswerKey {
    /// Free text must mention every required keyword and one of `any_of`
    Keywords {
        /// Keywords that must all appear
        required: Vec<String>,
        /// At least one of these must appear (ignored when empty)
        any_of: Vec<String>,
    },
    /// Index of the correct choice
    Choice(usize),
    /// Correct modifier per field name
    AccessModifiers(IndexMap<String, AccessModifier>),
}

/// A learner's answer
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// Free text
    Text(String),
    /// Selected choice
    Choice(usize),
    /// Modifier picked per field
    Modifiers(IndexMap<String, AccessModifier>),
}

/// Result of checking an answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Correct
    Accepted,
    /// Wrong; show the hint
    Rejected {
        /// Hint for the learner
        hint: String,
    },
}

impl Verdict {
    /// Whether the answer was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// A quiz question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    /// Stable identifier
    pub id: String,
    /// Question shown to the learner
    pub prompt: String,
    /// Answer key
    pub key: AnswerKey,
    /// Hint shown when the answer is rejected
    pub hint: String,
}

impl Challenge {
    /// Create a challenge
    pub fn new(
        id: impl Into<String>,
        prompt: impl Into<String>,
        key: AnswerKey,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            key,
            hint: hint.into(),
        }
    }

    /// Read an answer typed on the command line in the shape the key expects.
    ///
    /// Choices are a number, modifiers are `field=modifier` pairs separated by
    /// commas, anything else is free text.
    pub fn parse_answer(&self, input: &str) -> Option<Answer> {
        match &self.key {
            AnswerKey::Keywords { .. } => Some(Answer::Text(input.to_string())),
            AnswerKey::Choice(_) => input.trim().parse().ok().map(Answer::Choice),
            AnswerKey::AccessModifiers(_) => input
                .split(',')
                .filter(|pair| !pair.trim().is_empty())
                .map(|pair| {
                    let (field, modifier) = pair.split_once('=')?;
                    Some((field.trim().to_string(), AccessModifier::parse(modifier)?))
                })
                .collect::<Option<IndexMap<_, _>>>()
                .map(Answer::Modifiers),
        }
    }

    /// Check an answer against the key
    pub fn check(&self, answer: &Answer) -> Verdict {
        let correct = match (&self.key, answer) {
            (AnswerKey::Keywords { required, any_of }, Answer::Text(text)) => {
                let text = text.to_lowercase();
                let mentions = |word: &String| text.contains(&word.to_lowercase());
                required.iter().all(mentions) && (any_of.is_empty() || any_of.iter().any(mentions))
            }
            (AnswerKey::Choice(expected), Answer::Choice(picked)) => expected == picked,
            (AnswerKey::AccessModifiers(expected), Answer::Modifiers(picked)) => expected
                .iter()
                .all(|(field, modifier)| picked.get(field) == Some(modifier)),
            _ => false,
        };

        if correct {
            Verdict::Accepted
        } else {
            tracing::debug!("Challenge {} rejected an answer", self.id);
            Verdict::Rejected {
                hint: self.hint.clone(),
            }
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| (*w).to_string()).collect()
}

/// Built-in challenges, one per concept
pub fn catalog() -> Vec<Challenge> {
    vec![
        Challenge::new(
            "properties",
            "Which fields of the crane describe what it is right now?",
            AnswerKey::Keywords {
                required: words(&["position"]),
                any_of: words(&["power", "cable", "claw", "holding"]),
            },
            "Look at the values that change when you press the buttons.",
        ),
        Challenge::new(
            "methods",
            "Which of these is a method of the crane? 0) serialNumber 1) grabItem() 2) isHoldingItem",
            AnswerKey::Choice(1),
            "Methods are actions: they are called, not read.",
        ),
        Challenge::new(
            "encapsulation",
            "Pick a modifier for each field of the crane class.",
            AnswerKey::AccessModifiers(IndexMap::from([
                ("serialNumber".to_string(), AccessModifier::Public),
                ("cableExtension".to_string(), AccessModifier::Private),
                ("motorTemperature".to_string(), AccessModifier::Private),
                ("clawAngle".to_string(), AccessModifier::Protected),
            ])),
            "Only expose what other objects really need to read.",
        ),
        Challenge::new(
            "inheritance",
            "What does a CraneRobot get from its Robot parent class?",
            AnswerKey::Keywords {
                required: Vec::new(),
                any_of: words(&["inherit", "power", "serial", "parent"]),
            },
            "Think about what every robot can do, crane or conveyor.",
        ),
        Challenge::new(
            "polymorphism",
            "Both robots answer powerOn(). What differs when they receive it?",
            AnswerKey::Keywords {
                required: Vec::new(),
                any_of: words(&["behav", "different", "own", "override"]),
            },
            "Same message, each robot reacts in its own way.",
        ),
    ]
}
