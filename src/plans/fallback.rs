use rand::Rng;

use super::dto::{CuisinePreference, MealPlan, Meals, NutritionInfo, UserProfile};

pub struct DayTemplate {
    pub breakfast: &'static str,
    pub lunch: &'static str,
    pub dinner: &'static str,
    pub snacks: [&'static str; 2],
}

pub const NORTH_INDIAN: DayTemplate = DayTemplate {
    breakfast: "Aloo Paratha with curd and pickle, served with a glass of lassi",
    lunch: "Roti with Dal Makhani, Mix Vegetable Sabzi, Raita, and Salad",
    dinner: "Jeera Rice with Vegetable Kadhai and Cucumber Raita",
    snacks: ["Masala Chai with Samosa", "Roasted Makhana"],
};

pub const SOUTH_INDIAN: DayTemplate = DayTemplate {
    breakfast: "Idli Sambar with coconut chutney and a side of fresh fruits",
    lunch: "Rice with Sambar, Rasam, Avial, and Papad. Served with buttermilk",
    dinner: "Dosa with Vegetable Korma and Tomato Chutney",
    snacks: ["Medu Vada with Sambar", "Mysore Pak with herbal tea"],
};

/// South Indian for `south-indian`, and for `both` on even days.
pub fn template_for(cuisine: &CuisinePreference, day: u32) -> &'static DayTemplate {
    match cuisine {
        CuisinePreference::SouthIndian => &SOUTH_INDIAN,
        CuisinePreference::Both if day % 2 == 0 => &SOUTH_INDIAN,
        _ => &NORTH_INDIAN,
    }
}

/// One synthesized day. Meals are fixed by cuisine and day parity; nutrition is a
/// baseline plus bounded jitter from `rng` unless the user set explicit targets.
pub fn day_plan<R: Rng + ?Sized>(profile: &UserProfile, day: u32, rng: &mut R) -> MealPlan {
    let t = template_for(&profile.cuisine_preference, day);
    let targets = profile.macro_targets();

    let mut pick = |target: Option<f64>, base: f64, spread: f64| -> f64 {
        match target {
            Some(v) => v,
            None => (base + rng.gen::<f64>() * spread).round(),
        }
    };

    let nutrition = NutritionInfo {
        calories: pick(targets.and_then(|m| m.calories), 1800.0, 400.0),
        protein: pick(targets.and_then(|m| m.protein), 65.0, 20.0),
        carbs: pick(targets.and_then(|m| m.carbs), 220.0, 30.0),
        fat: pick(targets.and_then(|m| m.fat), 55.0, 15.0),
        fiber: targets.and_then(|m| m.fiber),
    };

    MealPlan {
        day,
        meals: Meals {
            breakfast: t.breakfast.to_string(),
            lunch: t.lunch.to_string(),
            dinner: t.dinner.to_string(),
            snacks: t.snacks.iter().map(|s| s.to_string()).collect(),
        },
        nutrition_info: Some(nutrition),
    }
}

pub fn synthesize<R: Rng + ?Sized>(profile: &UserProfile, rng: &mut R) -> Vec<MealPlan> {
    (1..=profile.days).map(|day| day_plan(profile, day, rng)).collect()
}

pub fn recommendations() -> Vec<String> {
    [
        "Stay hydrated by drinking 8-10 glasses of water daily",
        "Include a variety of colorful vegetables in your diet",
        "Try to maintain consistent meal timings for better digestion",
        "Consider including fermented foods like yogurt for gut health",
        "For vegetarian diets, ensure adequate protein from legumes, dairy, and nuts",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::plans::dto::fixtures::{profile, with_macros};

    #[test]
    fn both_alternates_north_then_south() {
        let p = profile(4, CuisinePreference::Both);
        let plans = synthesize(&p, &mut StdRng::seed_from_u64(1));
        let breakfasts: Vec<&str> = plans.iter().map(|m| m.meals.breakfast.as_str()).collect();
        assert_eq!(
            breakfasts,
            vec![
                NORTH_INDIAN.breakfast,
                SOUTH_INDIAN.breakfast,
                NORTH_INDIAN.breakfast,
                SOUTH_INDIAN.breakfast
            ]
        );
    }

    #[test]
    fn single_cuisine_never_alternates() {
        let south = synthesize(
            &profile(3, CuisinePreference::SouthIndian),
            &mut StdRng::seed_from_u64(1),
        );
        assert!(south.iter().all(|m| m.meals.dinner == SOUTH_INDIAN.dinner));

        let other = synthesize(
            &profile(3, CuisinePreference::Other("bengali".into())),
            &mut StdRng::seed_from_u64(1),
        );
        assert!(other.iter().all(|m| m.meals.dinner == NORTH_INDIAN.dinner));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = profile(30, CuisinePreference::NorthIndian);
        for plan in synthesize(&p, &mut StdRng::seed_from_u64(99)) {
            let n = plan.nutrition_info.unwrap();
            assert!((1800.0..=2200.0).contains(&n.calories));
            assert!((65.0..=85.0).contains(&n.protein));
            assert!((220.0..=250.0).contains(&n.carbs));
            assert!((55.0..=70.0).contains(&n.fat));
            assert_eq!(n.calories, n.calories.round());
            assert_eq!(n.fiber, None);
        }
    }

    #[test]
    fn explicit_targets_are_copied_every_day_every_time() {
        let p = with_macros(profile(5, CuisinePreference::Both));
        for seed in 0..3 {
            for plan in synthesize(&p, &mut StdRng::seed_from_u64(seed)) {
                let n = plan.nutrition_info.unwrap();
                assert_eq!(n.calories, 2150.0);
                assert_eq!(n.protein, 95.0);
                assert_eq!(n.carbs, 240.0);
                assert_eq!(n.fat, 70.0);
                assert_eq!(n.fiber, Some(32.0));
            }
        }
    }

    #[test]
    fn same_seed_gives_identical_plans() {
        let p = profile(3, CuisinePreference::Both);
        let a = synthesize(&p, &mut StdRng::seed_from_u64(5));
        let b = synthesize(&p, &mut StdRng::seed_from_u64(5));
        assert_eq!(a, b);
    }
}
