use log::{debug, info};
use std::collections::HashMap;

use crate::catalog::{AllergyId, Food, UserId};
use crate::store::{MealStore, StoreError};

/// Built-in allergen ids and their canonical names.
const ALLERGEN_NAMES: &[(AllergyId, &str)] = &[
    (1, "egg"),
    (2, "beef"),
    (3, "pork"),
    (4, "chicken"),
    (5, "shrimp"),
    (6, "crab"),
    (7, "squid"),
    (8, "mackerel"),
    (9, "shellfish"),
    (10, "milk"),
    (11, "peanut"),
    (12, "walnut"),
    (13, "pine nut"),
    (14, "soybean"),
    (15, "peach"),
    (16, "tomato"),
    (17, "wheat"),
    (18, "buckwheat"),
    (19, "sulfites"),
];

/// Ingredient substrings that betray each allergen, in English and in the
/// Korean used by the catalog.
const ALLERGEN_SYNONYMS: &[(&str, &[&str])] = &[
    ("egg", &["egg", "boiled egg", "egg white", "egg yolk", "omelet", "scrambled egg", "난류", "계란", "달걀", "유정란", "특란", "초란", "계란흰자", "계란노른자", "계란말이", "스크램블에그", "오믈렛"]),
    ("beef", &["beef", "bulgogi", "brisket", "beef jerky", "bone broth", "소고기", "쇠고기", "치마살", "우육", "불고기", "갈비", "육포", "사골", "소스지", "한우"]),
    ("pork", &["pork", "bacon", "ham", "sausage", "pork belly", "tonkatsu", "돼지고기", "삼겹", "삼겹살", "목살", "앞다리", "돈육", "제육", "돈가스", "햄", "베이컨", "순대", "소세지", "바베큐", "폭립"]),
    ("chicken", &["chicken", "chicken breast", "닭고기", "닭가슴살", "닭다리", "치킨", "백숙", "삼계탕", "닭죽", "닭볶음탕", "닭육수"]),
    ("shrimp", &["shrimp", "prawn", "새우", "대하", "초밥새우", "새우튀김", "칵테일새우", "깐쇼새우", "건새우"]),
    ("crab", &["crab", "king crab", "꽃게", "게살", "게장", "간장게장", "양념게장", "킹크랩", "대게", "꽃게탕"]),
    ("squid", &["squid", "dried squid", "오징어", "마른오징어", "오징어채", "오징어무침", "오징어볶음", "오삼불고기"]),
    ("mackerel", &["mackerel", "고등어", "고등어조림", "고등어구이", "고등어회"]),
    ("shellfish", &["clam", "mussel", "oyster", "scallop", "abalone", "conch", "조개", "바지락", "모시조개", "백합", "홍합", "재첩", "가리비", "조개탕", "전복", "관자", "다슬기", "우렁", "성게", "소라", "꼬막", "굴", "골뱅이", "골벵이", "멍게"]),
    ("milk", &["milk", "cheese", "butter", "cream", "yogurt", "condensed milk", "ice cream", "soy milk", "우유", "치즈", "버터", "연유", "생크림", "요거트", "유제품", "두유", "아이스크림", "아구르트", "야쿠르트", "초코바"]),
    ("peanut", &["peanut", "peanut butter", "nuts", "땅콩", "피넛", "피넛버터", "땅콩버터", "견과류"]),
    ("walnut", &["walnut", "nuts", "호두", "호두과자", "견과류"]),
    ("pine nut", &["pine nut", "nuts", "잣", "견과류"]),
    ("soybean", &["soybean", "soy", "tofu", "soy sauce", "soybean paste", "soy milk", "대두", "콩", "된장", "간장", "두부", "콩기름", "두유"]),
    ("peach", &["peach", "canned peach", "복숭아", "황도", "백도", "통조림복숭아"]),
    ("tomato", &["tomato", "cherry tomato", "tomato sauce", "ketchup", "토마토", "방울토마토", "토마토소스", "케찹"]),
    ("wheat", &["wheat", "flour", "bread", "noodle", "pasta", "cake", "cookie", "donut", "tortilla", "spaghetti", "밀가루", "빵", "면", "국수", "파스타", "케이크", "쿠키", "도넛", "밀또띠아", "스파게티", "수제비"]),
    ("buckwheat", &["buckwheat", "soba", "메밀", "메밀국수", "냉면", "막국수"]),
    ("sulfites", &["sulfite", "sulfur dioxide", "so2", "preservative", "아황산", "이산화황", "보존료", "아황산나트륨"]),
];

/// Allergen id → name mapping plus the synonym sets used for exclusion.
#[derive(Debug, Clone)]
pub struct AllergenTable {
    names: HashMap<AllergyId, String>,
    synonyms: HashMap<String, Vec<String>>,
}

impl Default for AllergenTable {
    fn default() -> Self {
        AllergenTable::builtin()
    }
}

impl AllergenTable {
    pub fn builtin() -> Self {
        AllergenTable::new(
            ALLERGEN_NAMES.iter().map(|&(id, name)| (id, name.to_string())),
            ALLERGEN_SYNONYMS
                .iter()
                .map(|&(name, words)| (name.to_string(), words.iter().map(|w| w.to_string()).collect())),
        )
    }

    pub fn new<N, S>(names: N, synonyms: S) -> Self
    where
        N: IntoIterator<Item = (AllergyId, String)>,
        S: IntoIterator<Item = (String, Vec<String>)>,
    {
        AllergenTable {
            names: names.into_iter().collect(),
            synonyms: synonyms.into_iter().collect(),
        }
    }

    pub fn name(&self, allergy_id: AllergyId) -> Option<&str> {
        self.names.get(&allergy_id).map(String::as_str)
    }

    /// Lower-cased synonyms for an allergen name; a name without configured
    /// synonyms stands for itself.
    pub fn synonyms(&self, name: &str) -> Vec<String> {
        match self.synonyms.get(name) {
            Some(words) if !words.is_empty() => words.iter().map(|w| w.to_lowercase()).collect(),
            _ => vec![name.to_lowercase()],
        }
    }

    /// One synonym set per recognised allergen id; unknown ids are ignored.
    pub fn exclusion_sets(&self, allergy_ids: &[AllergyId]) -> Vec<Vec<String>> {
        allergy_ids
            .iter()
            .filter_map(|&id| self.name(id))
            .map(|name| self.synonyms(name))
            .collect()
    }
}

/// True when no synonym of any allergen occurs in the food's name or materials.
pub fn is_food_safe(food: &Food, exclusion_sets: &[Vec<String>]) -> bool {
    let name = food.name.to_lowercase();
    let materials = food.materials.to_lowercase();
    exclusion_sets.iter().all(|synonyms| {
        synonyms
            .iter()
            .all(|word| !name.contains(word.as_str()) && !materials.contains(word.as_str()))
    })
}

/// Foods the user can eat. With no recorded (or no recognised) allergies the
/// whole catalog is returned.
pub fn filter_foods_by_allergy<S: MealStore + ?Sized>(
    store: &S,
    table: &AllergenTable,
    user_id: Option<UserId>,
) -> Result<Vec<Food>, StoreError> {
    let allergy_ids = match user_id {
        Some(id) => store.user_allergy_ids(id)?,
        None => Vec::new(),
    };
    if allergy_ids.is_empty() {
        let foods = store.all_foods()?;
        debug!("No allergies for user {:?}; returning all {} foods", user_id, foods.len());
        return Ok(foods);
    }

    let exclusion_sets = table.exclusion_sets(&allergy_ids);
    if exclusion_sets.is_empty() {
        debug!("No recognised allergens in {:?}; returning all foods", allergy_ids);
        return store.all_foods();
    }

    let foods = store.foods_matching(&|food: &Food| is_food_safe(food, &exclusion_sets))?;
    info!(
        "Allergy filter for user {:?} (allergies {:?}): {} foods remain",
        user_id,
        allergy_ids,
        foods.len()
    );
    Ok(foods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FoodRole;
    use crate::store::InMemoryStore;

    fn catalog() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store.upsert_foods(vec![
            Food::new(1, "Egg Roll", FoodRole::SideDish, "egg white, carrot, salt"),
            Food::new(2, "Steamed Rice", FoodRole::Rice, "rice, water"),
            Food::new(3, "Cheese Cake", FoodRole::Dessert, "flour, CHEESE, sugar"),
            Food::new(4, "계란말이", FoodRole::SideDish, "계란, 파"),
            Food::new(5, "Seaweed Soup", FoodRole::Soup, "seaweed, sesame oil"),
        ]);
        store
    }

    fn ids(foods: &[Food]) -> Vec<i64> {
        foods.iter().map(|f| f.id).collect()
    }

    #[test]
    fn test_no_allergies_returns_everything() -> Result<(), StoreError> {
        let store = catalog();
        let table = AllergenTable::builtin();
        assert_eq!(ids(&filter_foods_by_allergy(&store, &table, Some(1))?), vec![1, 2, 3, 4, 5]);
        assert_eq!(ids(&filter_foods_by_allergy(&store, &table, None)?), vec![1, 2, 3, 4, 5]);
        Ok(())
    }

    #[test]
    fn test_egg_allergy_excludes_egg_roll() -> Result<(), StoreError> {
        let mut store = catalog();
        store.add_user_allergy(1, 1);
        let foods = filter_foods_by_allergy(&store, &AllergenTable::builtin(), Some(1))?;
        assert_eq!(ids(&foods), vec![2, 3, 5]);
        Ok(())
    }

    #[test]
    fn test_allergens_combine_across_sets() -> Result<(), StoreError> {
        let mut store = catalog();
        store.add_user_allergy(1, 1);
        store.add_user_allergy(1, 10); // milk → cheese, case-insensitive
        let foods = filter_foods_by_allergy(&store, &AllergenTable::builtin(), Some(1))?;
        assert_eq!(ids(&foods), vec![2, 5]);
        Ok(())
    }

    #[test]
    fn test_unknown_allergy_ids_are_ignored() -> Result<(), StoreError> {
        let mut store = catalog();
        store.add_user_allergy(1, 999);
        let foods = filter_foods_by_allergy(&store, &AllergenTable::builtin(), Some(1))?;
        assert_eq!(foods.len(), 5);
        Ok(())
    }

    #[test]
    fn test_name_without_synonyms_stands_for_itself() -> Result<(), StoreError> {
        let mut store = catalog();
        store.add_user_allergy(1, 50);
        let table = AllergenTable::new(vec![(50, "seaweed".to_string())], Vec::new());
        assert_eq!(table.synonyms("seaweed"), vec!["seaweed".to_string()]);
        let foods = filter_foods_by_allergy(&store, &table, Some(1))?;
        assert_eq!(ids(&foods), vec![1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_every_builtin_name_has_synonyms() {
        let table = AllergenTable::builtin();
        for &(id, name) in ALLERGEN_NAMES {
            assert_eq!(table.name(id), Some(name));
            assert!(table.synonyms(name).len() > 1, "{} has no synonyms", name);
        }
    }
}
