use uuid::Uuid;

use crate::auth;
use crate::db::DatabaseProxy;

struct SeedLesson {
    character: &'static str,
    romanization: &'static str,
    description: &'static str,
    tags: &'static [&'static str],
    example_korean: &'static str,
    example_romanization: &'static str,
    example_english: &'static str,
}

const HANGUL_CATALOG: &[SeedLesson] = &[
    // Basic vowels
    SeedLesson {
        character: "ㅏ",
        romanization: "a",
        description: "Basic vowel, sounds like 'a' in 'father'.",
        tags: &["vowel", "basic"],
        example_korean: "아빠",
        example_romanization: "appa",
        example_english: "dad",
    },
    SeedLesson {
        character: "ㅑ",
        romanization: "ya",
        description: "Basic vowel, sounds like 'ya' in 'yard'.",
        tags: &["vowel", "basic"],
        example_korean: "야구",
        example_romanization: "yagu",
        example_english: "baseball",
    },
    SeedLesson {
        character: "ㅓ",
        romanization: "eo",
        description: "Basic vowel, sounds like 'u' in 'up'.",
        tags: &["vowel", "basic"],
        example_korean: "어머니",
        example_romanization: "eomeoni",
        example_english: "mother",
    },
    SeedLesson {
        character: "ㅕ",
        romanization: "yeo",
        description: "Basic vowel, sounds like 'yu' in 'yummy'.",
        tags: &["vowel", "basic"],
        example_korean: "여름",
        example_romanization: "yeoreum",
        example_english: "summer",
    },
    SeedLesson {
        character: "ㅗ",
        romanization: "o",
        description: "Basic vowel, sounds like 'o' in 'go'.",
        tags: &["vowel", "basic"],
        example_korean: "오이",
        example_romanization: "oi",
        example_english: "cucumber",
    },
    SeedLesson {
        character: "ㅛ",
        romanization: "yo",
        description: "Basic vowel, sounds like 'yo' in 'yoga'.",
        tags: &["vowel", "basic"],
        example_korean: "요리",
        example_romanization: "yori",
        example_english: "cooking",
    },
    SeedLesson {
        character: "ㅜ",
        romanization: "u",
        description: "Basic vowel, sounds like 'oo' in 'moon'.",
        tags: &["vowel", "basic"],
        example_korean: "우유",
        example_romanization: "uyu",
        example_english: "milk",
    },
    SeedLesson {
        character: "ㅠ",
        romanization: "yu",
        description: "Basic vowel, sounds like 'you'.",
        tags: &["vowel", "basic"],
        example_korean: "유리",
        example_romanization: "yuri",
        example_english: "glass",
    },
    SeedLesson {
        character: "ㅡ",
        romanization: "eu",
        description: "Basic vowel, an unrounded 'u' with spread lips.",
        tags: &["vowel", "basic"],
        example_korean: "그림",
        example_romanization: "geurim",
        example_english: "picture",
    },
    SeedLesson {
        character: "ㅣ",
        romanization: "i",
        description: "Basic vowel, sounds like 'ee' in 'see'.",
        tags: &["vowel", "basic"],
        example_korean: "이름",
        example_romanization: "ireum",
        example_english: "name",
    },
    // Compound vowels
    SeedLesson {
        character: "ㅐ",
        romanization: "ae",
        description: "Compound vowel, sounds like 'a' in 'cat'.",
        tags: &["vowel", "compound"],
        example_korean: "개",
        example_romanization: "gae",
        example_english: "dog",
    },
    SeedLesson {
        character: "ㅒ",
        romanization: "yae",
        description: "Compound vowel, 'y' plus the 'ae' sound.",
        tags: &["vowel", "compound"],
        example_korean: "얘기",
        example_romanization: "yaegi",
        example_english: "talk",
    },
    SeedLesson {
        character: "ㅔ",
        romanization: "e",
        description: "Compound vowel, sounds like 'e' in 'bed'.",
        tags: &["vowel", "compound"],
        example_korean: "네",
        example_romanization: "ne",
        example_english: "yes",
    },
    SeedLesson {
        character: "ㅖ",
        romanization: "ye",
        description: "Compound vowel, sounds like 'ye' in 'yes'.",
        tags: &["vowel", "compound"],
        example_korean: "예의",
        example_romanization: "yeui",
        example_english: "manners",
    },
    SeedLesson {
        character: "ㅘ",
        romanization: "wa",
        description: "Compound vowel, sounds like 'wa' in 'water'.",
        tags: &["vowel", "compound"],
        example_korean: "과일",
        example_romanization: "gwail",
        example_english: "fruit",
    },
    SeedLesson {
        character: "ㅙ",
        romanization: "wae",
        description: "Compound vowel, 'w' plus the 'ae' sound.",
        tags: &["vowel", "compound"],
        example_korean: "왜",
        example_romanization: "wae",
        example_english: "why",
    },
    SeedLesson {
        character: "ㅚ",
        romanization: "oe",
        description: "Compound vowel, close to 'we' in 'wedding'.",
        tags: &["vowel", "compound"],
        example_korean: "외국",
        example_romanization: "oeguk",
        example_english: "foreign country",
    },
    SeedLesson {
        character: "ㅝ",
        romanization: "wo",
        description: "Compound vowel, sounds like 'wo' in 'wonder'.",
        tags: &["vowel", "compound"],
        example_korean: "원숭이",
        example_romanization: "wonsungi",
        example_english: "monkey",
    },
    SeedLesson {
        character: "ㅞ",
        romanization: "we",
        description: "Compound vowel, sounds like 'we' in 'wet'.",
        tags: &["vowel", "compound"],
        example_korean: "웨딩",
        example_romanization: "weding",
        example_english: "wedding",
    },
    SeedLesson {
        character: "ㅟ",
        romanization: "wi",
        description: "Compound vowel, sounds like 'we' in 'week'.",
        tags: &["vowel", "compound"],
        example_korean: "귀",
        example_romanization: "gwi",
        example_english: "ear",
    },
    SeedLesson {
        character: "ㅢ",
        romanization: "ui",
        description: "Compound vowel, a quick 'eu' gliding into 'i'.",
        tags: &["vowel", "compound"],
        example_korean: "의사",
        example_romanization: "uisa",
        example_english: "doctor",
    },
    // Basic consonants
    SeedLesson {
        character: "ㄱ",
        romanization: "g",
        description: "Consonant giyeok, between 'g' and 'k'.",
        tags: &["consonant", "basic"],
        example_korean: "가방",
        example_romanization: "gabang",
        example_english: "bag",
    },
    SeedLesson {
        character: "ㄴ",
        romanization: "n",
        description: "Consonant nieun, sounds like 'n'.",
        tags: &["consonant", "basic"],
        example_korean: "나무",
        example_romanization: "namu",
        example_english: "tree",
    },
    SeedLesson {
        character: "ㄷ",
        romanization: "d",
        description: "Consonant digeut, between 'd' and 't'.",
        tags: &["consonant", "basic"],
        example_korean: "다리",
        example_romanization: "dari",
        example_english: "bridge",
    },
    SeedLesson {
        character: "ㄹ",
        romanization: "r",
        description: "Consonant rieul, between 'r' and 'l'.",
        tags: &["consonant", "basic"],
        example_korean: "라면",
        example_romanization: "ramyeon",
        example_english: "ramen",
    },
    SeedLesson {
        character: "ㅁ",
        romanization: "m",
        description: "Consonant mieum, sounds like 'm'.",
        tags: &["consonant", "basic"],
        example_korean: "물",
        example_romanization: "mul",
        example_english: "water",
    },
    SeedLesson {
        character: "ㅂ",
        romanization: "b",
        description: "Consonant bieup, between 'b' and 'p'.",
        tags: &["consonant", "basic"],
        example_korean: "바다",
        example_romanization: "bada",
        example_english: "sea",
    },
    SeedLesson {
        character: "ㅅ",
        romanization: "s",
        description: "Consonant siot, sounds like 's'.",
        tags: &["consonant", "basic"],
        example_korean: "사과",
        example_romanization: "sagwa",
        example_english: "apple",
    },
    SeedLesson {
        character: "ㅇ",
        romanization: "ng",
        description: "Consonant ieung, silent at the start, 'ng' at the end.",
        tags: &["consonant", "basic"],
        example_korean: "아이",
        example_romanization: "ai",
        example_english: "child",
    },
    SeedLesson {
        character: "ㅈ",
        romanization: "j",
        description: "Consonant jieut, between 'j' and 'ch'.",
        tags: &["consonant", "basic"],
        example_korean: "자동차",
        example_romanization: "jadongcha",
        example_english: "car",
    },
    SeedLesson {
        character: "ㅊ",
        romanization: "ch",
        description: "Consonant chieut, an aspirated 'ch'.",
        tags: &["consonant", "basic"],
        example_korean: "차",
        example_romanization: "cha",
        example_english: "tea",
    },
    SeedLesson {
        character: "ㅋ",
        romanization: "k",
        description: "Consonant kieuk, an aspirated 'k'.",
        tags: &["consonant", "basic"],
        example_korean: "코",
        example_romanization: "ko",
        example_english: "nose",
    },
    SeedLesson {
        character: "ㅌ",
        romanization: "t",
        description: "Consonant tieut, an aspirated 't'.",
        tags: &["consonant", "basic"],
        example_korean: "토끼",
        example_romanization: "tokki",
        example_english: "rabbit",
    },
    SeedLesson {
        character: "ㅍ",
        romanization: "p",
        description: "Consonant pieup, an aspirated 'p'.",
        tags: &["consonant", "basic"],
        example_korean: "포도",
        example_romanization: "podo",
        example_english: "grape",
    },
    SeedLesson {
        character: "ㅎ",
        romanization: "h",
        description: "Consonant hieut, sounds like 'h'.",
        tags: &["consonant", "basic"],
        example_korean: "하늘",
        example_romanization: "haneul",
        example_english: "sky",
    },
    // Double consonants
    SeedLesson {
        character: "ㄲ",
        romanization: "kk",
        description: "Tense double consonant, a tight unaspirated 'k'.",
        tags: &["consonant", "double"],
        example_korean: "꽃",
        example_romanization: "kkot",
        example_english: "flower",
    },
    SeedLesson {
        character: "ㄸ",
        romanization: "tt",
        description: "Tense double consonant, a tight unaspirated 't'.",
        tags: &["consonant", "double"],
        example_korean: "딸기",
        example_romanization: "ttalgi",
        example_english: "strawberry",
    },
    SeedLesson {
        character: "ㅃ",
        romanization: "pp",
        description: "Tense double consonant, a tight unaspirated 'p'.",
        tags: &["consonant", "double"],
        example_korean: "빵",
        example_romanization: "ppang",
        example_english: "bread",
    },
    SeedLesson {
        character: "ㅆ",
        romanization: "ss",
        description: "Tense double consonant, a sharp 's'.",
        tags: &["consonant", "double"],
        example_korean: "쌀",
        example_romanization: "ssal",
        example_english: "rice",
    },
    SeedLesson {
        character: "ㅉ",
        romanization: "jj",
        description: "Tense double consonant, a tight unaspirated 'j'.",
        tags: &["consonant", "double"],
        example_korean: "짜다",
        example_romanization: "jjada",
        example_english: "salty",
    },
];

/// Seeds the Hangul lesson catalog when the table is empty. Controlled by
/// SEED_HANGUL (default on); never fails startup.
pub async fn seed_hangul_lessons(proxy: &DatabaseProxy) {
    if !env_bool("SEED_HANGUL").unwrap_or(true) {
        tracing::debug!("hangul seeding disabled via SEED_HANGUL");
        return;
    }

    let pool = proxy.pool();

    let count: i64 = match sqlx::query_scalar(r#"SELECT COUNT(*) FROM "hangul_lessons""#)
        .fetch_one(pool)
        .await
    {
        Ok(count) => count,
        Err(err) => {
            tracing::warn!(error = %err, "failed to count hangul lessons, skipping seed");
            return;
        }
    };

    if count > 0 {
        tracing::debug!(count = count, "hangul lessons already present");
        return;
    }

    let now = chrono::Utc::now().naive_utc();
    let mut inserted = 0usize;

    for (index, lesson) in HANGUL_CATALOG.iter().enumerate() {
        let examples = serde_json::json!({
            "words": [{
                "korean": lesson.example_korean,
                "romanization": lesson.example_romanization,
                "english": lesson.example_english,
            }]
        });
        let tags: Vec<String> = lesson.tags.iter().map(|tag| tag.to_string()).collect();

        if let Err(err) = sqlx::query(
            r#"
            INSERT INTO "hangul_lessons"
                ("id","character","romanization","description","characterType","orderIndex","examples","createdAt","updatedAt")
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(lesson.character)
        .bind(lesson.romanization)
        .bind(lesson.description)
        .bind(&tags)
        .bind(index as i32 + 1)
        .bind(&examples)
        .bind(now)
        .execute(pool)
        .await
        {
            tracing::warn!(error = %err, character = lesson.character, "failed to seed hangul lesson");
        } else {
            inserted += 1;
        }
    }

    tracing::info!(inserted = inserted, "seeded hangul lesson catalog");
}

struct TestUser {
    email: &'static str,
    username: &'static str,
}

const TEST_USERS: &[TestUser] = &[
    TestUser {
        email: "test@example.com",
        username: "testuser",
    },
    TestUser {
        email: "learner@example.com",
        username: "learner",
    },
];

/// Seeds test users with live session tokens. Only runs under NODE_ENV=test.
pub async fn seed_test_users(proxy: &DatabaseProxy) {
    let node_env = std::env::var("NODE_ENV").unwrap_or_default();
    if node_env != "test" {
        return;
    }

    tracing::info!("NODE_ENV=test detected, seeding test users...");

    let pool = proxy.pool();

    for user in TEST_USERS {
        let existing: Option<String> =
            sqlx::query_scalar(r#"SELECT "id" FROM "users" WHERE "email" = $1"#)
                .bind(user.email)
                .fetch_optional(pool)
                .await
                .ok()
                .flatten();

        if existing.is_some() {
            tracing::debug!(email = user.email, "test user already exists");
            continue;
        }

        let user_id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();

        if let Err(err) = sqlx::query(
            r#"
            INSERT INTO "users" ("id","email","username","createdAt","updatedAt")
            VALUES ($1,$2,$3,$4,$4)
            "#,
        )
        .bind(&user_id)
        .bind(user.email)
        .bind(user.username)
        .bind(now)
        .execute(pool)
        .await
        {
            tracing::warn!(error = %err, email = user.email, "failed to seed test user");
            continue;
        }

        let (token, expires_at) = match auth::sign_jwt_for_user(&user_id) {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(error = %err, email = user.email, "failed to sign test token");
                continue;
            }
        };

        if let Err(err) = sqlx::query(
            r#"
            INSERT INTO "sessions" ("id","userId","token","expiresAt","createdAt")
            VALUES ($1,$2,$3,$4,$5)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&user_id)
        .bind(auth::hash_token(&token))
        .bind(expires_at)
        .bind(now)
        .execute(pool)
        .await
        {
            tracing::warn!(error = %err, email = user.email, "failed to seed test session");
        } else {
            tracing::info!(email = user.email, token = %token, "seeded test user with session token");
        }
    }
}

fn env_bool(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    let normalized = value.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return None;
    }
    match normalized.as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
