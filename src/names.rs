//! 신규 사용자 표시 이름 생성

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: [&str; 10] = [
    "Quick", "Lazy", "Happy", "Energetic", "Brave", "Clever", "Witty", "Calm", "Eager", "Gentle",
];

const NOUNS: [&str; 10] = [
    "Fox", "Dog", "Cat", "Mouse", "Lion", "Tiger", "Bear", "Wolf", "Eagle", "Shark",
];

/// `BraveFox42` 형식
pub fn random_display_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Anonymous");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("User");
    format!("{}{}{}", adjective, noun, rng.gen_range(1..=100))
}
