//! Subscription plan recommendation.

use serde_json::{Map, Value};

/// Plan for muscle gain goals.
pub const PLAN_BE_STRONG: &str = "BeStrong";
/// Plan for weight loss goals.
pub const PLAN_BE_LEAN: &str = "BeLean";
/// General wellness plan, the fallback.
pub const PLAN_BE_FIT: &str = "BeFit";

/// Key under which the recommended plan is stored in profile attributes.
pub const RECOMMENDED_PLAN_KEY: &str = "recommended_plan";

/// Plan name recommended for a fitness goal.
#[must_use]
pub fn recommended_plan(goal: Option<&str>) -> &'static str {
    match goal.map(|g| g.trim().to_ascii_lowercase()).as_deref() {
        Some("gain_muscle") => PLAN_BE_STRONG,
        Some("lose_weight") => PLAN_BE_LEAN,
        _ => PLAN_BE_FIT,
    }
}

/// Merge the recommended plan into a profile's free-form attributes.
///
/// Non-object attributes are replaced by an object.
#[must_use]
pub fn with_recommended_plan(attributes: Option<Value>, goal: Option<&str>) -> Value {
    let mut map = match attributes {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    map.insert(
        RECOMMENDED_PLAN_KEY.to_owned(),
        Value::String(recommended_plan(goal).to_owned()),
    );
    Value::Object(map)
}

/// Read the recommended plan back out of profile attributes.
#[must_use]
pub fn plan_from_attributes(attributes: &Value) -> Option<&str> {
    attributes.get(RECOMMENDED_PLAN_KEY).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_goal_mapping() {
        assert_eq!(recommended_plan(Some("gain_muscle")), PLAN_BE_STRONG);
        assert_eq!(recommended_plan(Some(" Lose_Weight ")), PLAN_BE_LEAN);
        assert_eq!(recommended_plan(Some("maintain")), PLAN_BE_FIT);
        assert_eq!(recommended_plan(None), PLAN_BE_FIT);
    }

    #[test]
    fn test_attributes_keep_existing_keys() {
        let attrs = with_recommended_plan(Some(json!({"diet": "vegan"})), Some("gain_muscle"));
        assert_eq!(attrs["diet"], "vegan");
        assert_eq!(plan_from_attributes(&attrs), Some(PLAN_BE_STRONG));
    }

    #[test]
    fn test_non_object_attributes_are_replaced() {
        let attrs = with_recommended_plan(Some(json!([1, 2])), None);
        assert_eq!(plan_from_attributes(&attrs), Some(PLAN_BE_FIT));
    }
}
