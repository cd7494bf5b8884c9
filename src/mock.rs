//! Built-in catalog used when the backend is unconfigured or empty

use crate::models::{Gender, Pet, PetStatus, PetType};

/// Favorites every fallback session starts with
pub const DEFAULT_FAVORITE_IDS: [&str; 2] = ["1", "4"];

struct Entry {
    id: &'static str,
    name: &'static str,
    pet_type: PetType,
    breed: &'static str,
    age: &'static str,
    gender: Gender,
    weight: &'static str,
    location: &'static str,
    description: &'static [&'static str],
    image: &'static str,
    health_status: &'static [&'static str],
    traits: &'static [&'static str],
    is_featured: bool,
    is_new: bool,
}

const CATALOG: &[Entry] = &[
    Entry {
        id: "1",
        name: "Lucky",
        pet_type: PetType::Dog,
        breed: "黃金獵犬",
        age: "2 歲",
        gender: Gender::Male,
        weight: "28 kg",
        location: "台北市",
        description: &[
            "Lucky 是一隻活潑又親人的黃金獵犬，最喜歡在公園裡追球。",
            "牠已經學會基本指令，和小朋友相處得很好。",
        ],
        image: "https://images.unsplash.com/photo-1552053831-71594a27632d?w=800",
        health_status: &["已結紮", "已施打疫苗", "已植入晶片"],
        traits: &["親人", "活潑", "愛玩球"],
        is_featured: true,
        is_new: false,
    },
    Entry {
        id: "2",
        name: "Momo",
        pet_type: PetType::Cat,
        breed: "米克斯",
        age: "1 歲",
        gender: Gender::Female,
        weight: "3.5 kg",
        location: "新北市",
        description: &[
            "Momo 是在巷口被救援的小橘貓，個性溫柔，喜歡窩在窗邊曬太陽。",
            "牠會用呼嚕聲迎接回家的人。",
        ],
        image: "https://images.unsplash.com/photo-1574158622682-e40e69881006?w=800",
        health_status: &["已結紮", "已施打疫苗"],
        traits: &["溫柔", "愛撒嬌"],
        is_featured: true,
        is_new: true,
    },
    Entry {
        id: "3",
        name: "Coco",
        pet_type: PetType::Dog,
        breed: "柴犬",
        age: "4 歲",
        gender: Gender::Female,
        weight: "9 kg",
        location: "台中市",
        description: &[
            "Coco 獨立又聰明，散步時很有自己的主見。",
            "適合有養狗經驗、願意耐心陪伴的家庭。",
        ],
        image: "https://images.unsplash.com/photo-1583337130417-3346a1be7dee?w=800",
        health_status: &["已施打疫苗", "已植入晶片"],
        traits: &["獨立", "聰明"],
        is_featured: false,
        is_new: false,
    },
    Entry {
        id: "4",
        name: "Oreo",
        pet_type: PetType::Cat,
        breed: "英國短毛貓",
        age: "3 歲",
        gender: Gender::Male,
        weight: "5 kg",
        location: "台北市",
        description: &[
            "Oreo 是一隻沉穩的黑白貓，喜歡安靜的環境。",
            "前飼主因移居海外無法照顧，希望牠能找到新家。",
        ],
        image: "https://images.unsplash.com/photo-1513245543132-31f507417b26?w=800",
        health_status: &["已結紮", "已施打疫苗", "已植入晶片"],
        traits: &["安靜", "穩定"],
        is_featured: false,
        is_new: true,
    },
    Entry {
        id: "5",
        name: "Bunny",
        pet_type: PetType::Rabbit,
        breed: "荷蘭垂耳兔",
        age: "8 個月",
        gender: Gender::Unknown,
        weight: "1.8 kg",
        location: "高雄市",
        description: &["Bunny 愛吃牧草，會在籠子裡開心地跳來跳去。"],
        image: "https://images.unsplash.com/photo-1585110396000-c9ffd4e4b308?w=800",
        health_status: &["健康檢查正常"],
        traits: &["好奇", "膽小"],
        is_featured: false,
        is_new: true,
    },
    Entry {
        id: "6",
        name: "Kiwi",
        pet_type: PetType::Bird,
        breed: "虎皮鸚鵡",
        age: "1 歲",
        gender: Gender::Male,
        weight: "35 g",
        location: "台南市",
        description: &["Kiwi 會模仿簡單的口哨聲，早上特別愛唱歌。"],
        image: "https://images.unsplash.com/photo-1552728089-57bdde30beb3?w=800",
        health_status: &["健康檢查正常"],
        traits: &["愛唱歌", "親人"],
        is_featured: true,
        is_new: false,
    },
];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// The fixed fallback catalog, ids `"1"` through `"6"`
pub fn pets() -> Vec<Pet> {
    CATALOG
        .iter()
        .map(|entry| Pet {
            id: entry.id.to_string(),
            name: entry.name.to_string(),
            pet_type: entry.pet_type,
            breed: entry.breed.to_string(),
            age: entry.age.to_string(),
            gender: entry.gender,
            weight: entry.weight.to_string(),
            location: entry.location.to_string(),
            description: strings(entry.description),
            images: vec![entry.image.to_string()],
            health_status: strings(entry.health_status),
            traits: strings(entry.traits),
            is_featured: entry.is_featured,
            is_new: entry.is_new,
            status: PetStatus::Available,
        })
        .collect()
}

pub fn default_favorite_ids() -> Vec<String> {
    strings(&DEFAULT_FAVORITE_IDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_favorites_are_in_the_catalog() {
        let ids: Vec<String> = pets().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, ["1", "2", "3", "4", "5", "6"]);
        for id in default_favorite_ids() {
            assert!(ids.contains(&id));
        }
    }
}
