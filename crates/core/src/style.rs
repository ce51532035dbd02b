//! Learning-Style Guidance
//!
//! Maps a student's learning style and the lesson topic to a short hint that
//! steers whether the topic plays to or against the student's strengths. The
//! mapping is a total function over `(LearningStyle, TopicCategory)`, so every
//! pair resolves to some guidance.

use std::fmt;

/// Learning styles with dedicated guidance. Anything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearningStyle {
    Algorithmic,
    Visual,
    Struggling,
    Other,
}

impl LearningStyle {
    /// Classifies a free-form profile tag.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_lowercase();
        if tag.contains("algorithm") || tag.contains("procedur") {
            LearningStyle::Algorithmic
        } else if tag.contains("visual") || tag.contains("spatial") {
            LearningStyle::Visual
        } else if tag.contains("struggl") {
            LearningStyle::Struggling
        } else {
            LearningStyle::Other
        }
    }
}

/// Broad families of lesson topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicCategory {
    Algebra,
    Fractions,
    Geometry,
    Arithmetic,
    General,
}

const ALGEBRA_KEYWORDS: &[&str] = &[
    "algebra",
    "equation",
    "linear",
    "variable",
    "expression",
    "slope",
    "function",
    "system",
    "inequalit",
];
const FRACTION_KEYWORDS: &[&str] = &[
    "fraction",
    "ratio",
    "proportion",
    "decimal",
    "percent",
    "numerator",
    "denominator",
];
const GEOMETRY_KEYWORDS: &[&str] = &[
    "geometry",
    "shape",
    "area",
    "perimeter",
    "angle",
    "volume",
    "triangle",
    "graph",
    "coordinate",
];
const ARITHMETIC_KEYWORDS: &[&str] = &[
    "addition",
    "subtraction",
    "multiplication",
    "division",
    "arithmetic",
    "place value",
    "times table",
    "integer",
];

impl TopicCategory {
    /// Classifies a topic by its keywords. Earlier families win ties.
    pub fn from_topic(topic: &str) -> Self {
        let topic = topic.to_lowercase();
        let matches = |keywords: &[&str]| keywords.iter().any(|k| topic.contains(k));
        if matches(ALGEBRA_KEYWORDS) {
            TopicCategory::Algebra
        } else if matches(FRACTION_KEYWORDS) {
            TopicCategory::Fractions
        } else if matches(GEOMETRY_KEYWORDS) {
            TopicCategory::Geometry
        } else if matches(ARITHMETIC_KEYWORDS) {
            TopicCategory::Arithmetic
        } else {
            TopicCategory::General
        }
    }
}

impl fmt::Display for TopicCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TopicCategory::Algebra => "algebra",
            TopicCategory::Fractions => "fractions",
            TopicCategory::Geometry => "geometry",
            TopicCategory::Arithmetic => "arithmetic",
            TopicCategory::General => "general",
        };
        f.write_str(name)
    }
}

/// Fallback for styles without dedicated guidance.
pub const NEUTRAL_GUIDANCE: &str =
    "Respond authentically from your own strengths and challenges. Give YOUR answer, not a generic correct answer.";

/// Returns the guidance hint for a style on a topic family.
pub fn style_guidance(style: LearningStyle, topic: TopicCategory) -> &'static str {
    use LearningStyle::*;
    use TopicCategory::*;

    match (style, topic) {
        (Algorithmic, Algebra) => {
            "This topic plays to your strengths: lean on clear steps and rules, and show confidence in the procedure. You may skip over WHY the steps work."
        }
        (Algorithmic, Arithmetic) => {
            "This topic plays to your strengths: answer quickly with the exact procedure, possibly before thinking about meaning."
        }
        (Algorithmic, Fractions) => {
            "You can follow fraction rules such as common denominators, but the meaning of a fraction as part of a whole is less natural to you. Reach for the rule first."
        }
        (Algorithmic, Geometry) => {
            "Pictures and shapes are harder for you than formulas. Look for a formula to apply and be unsure when none fits."
        }
        (Algorithmic, General) => {
            "Look for a familiar procedure. If the question is open-ended, show some hesitation until you find a rule to apply."
        }

        (Visual, Geometry) => {
            "This topic plays to your strengths: describe what you see, draw on pictures and diagrams, and be enthusiastic."
        }
        (Visual, Fractions) => {
            "This topic plays to your strengths: think in pizzas, bars and number lines, and explain using the picture in your head."
        }
        (Visual, Algebra) => {
            "Symbols without pictures are hard for you. Try to turn the equation into a picture or graph, and show partial understanding if you cannot."
        }
        (Visual, Arithmetic) => {
            "Picture the quantities as groups or arrays. You may be slower with pure calculation but can explain the idea."
        }
        (Visual, General) => {
            "Try to picture the situation before answering and describe what you imagine."
        }

        (Struggling, Algebra) => {
            "This topic is hard for you. Show realistic struggle: partial steps, a common misconception, or uncertainty about what the letters mean."
        }
        (Struggling, Fractions) => {
            "Fractions confuse you. You might mix up numerator and denominator or add the bottoms together. Show genuine, partial thinking."
        }
        (Struggling, Geometry) => {
            "You may recognize shapes but mix up formulas such as area and perimeter. Show honest partial understanding."
        }
        (Struggling, Arithmetic) => {
            "You can get there with effort, but you are slow and unsure. Share your steps hesitantly."
        }
        (Struggling, General) => {
            "You are unsure about this. Share what you partly understand and where you get stuck."
        }

        (Other, _) => NEUTRAL_GUIDANCE,
    }
}

/// Convenience wrapper over raw profile and lesson strings.
pub fn guidance_for(learning_style: &str, topic: &str) -> &'static str {
    style_guidance(
        LearningStyle::from_tag(learning_style),
        TopicCategory::from_topic(topic),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: [LearningStyle; 4] = [
        LearningStyle::Algorithmic,
        LearningStyle::Visual,
        LearningStyle::Struggling,
        LearningStyle::Other,
    ];
    const TOPICS: [TopicCategory; 5] = [
        TopicCategory::Algebra,
        TopicCategory::Fractions,
        TopicCategory::Geometry,
        TopicCategory::Arithmetic,
        TopicCategory::General,
    ];

    #[test]
    fn test_every_pair_has_guidance() {
        for style in STYLES {
            for topic in TOPICS {
                assert!(
                    !style_guidance(style, topic).trim().is_empty(),
                    "missing guidance for {:?}/{}",
                    style,
                    topic
                );
            }
        }
    }

    #[test]
    fn test_unknown_style_falls_back_to_neutral() {
        let style = LearningStyle::from_tag("kinesthetic");
        assert_eq!(style, LearningStyle::Other);
        for topic in TOPICS {
            assert_eq!(style_guidance(style, topic), NEUTRAL_GUIDANCE);
        }
        assert_eq!(guidance_for("", "Fractions"), NEUTRAL_GUIDANCE);
    }

    #[test]
    fn test_style_tags_are_case_insensitive() {
        let cases = [
            ("Algorithmic", LearningStyle::Algorithmic),
            ("VISUAL-spatial", LearningStyle::Visual),
            ("struggling learner", LearningStyle::Struggling),
        ];
        for (tag, style) in cases {
            assert_eq!(LearningStyle::from_tag(tag), style, "tag {tag}");
        }
    }

    #[test]
    fn test_topic_classification() {
        let cases = [
            (
                "Linear Expressions & Single-Variable Equations",
                TopicCategory::Algebra,
            ),
            (
                "Introduction to Fractions - Parts of a Whole",
                TopicCategory::Fractions,
            ),
            ("Area of Triangles", TopicCategory::Geometry),
            ("Place Value", TopicCategory::Arithmetic),
            ("Probability", TopicCategory::General),
            ("", TopicCategory::General),
        ];
        for (topic, category) in cases {
            assert_eq!(TopicCategory::from_topic(topic), category, "{topic}");
        }
    }

    #[test]
    fn test_topic_plays_to_or_against_strengths() {
        assert!(guidance_for("visual", "Fractions").contains("strengths"));
        assert!(guidance_for("algorithmic", "Solving equations").contains("strengths"));
        assert!(guidance_for("struggling", "Fractions").contains("confuse"));
    }
}
