//! Table naming convention.
//!
//! A model's storage table is named after the model: CamelCase becomes
//! snake_case and the last word is pluralized (`BlogPost` → `blog_posts`).

use heck::ToSnakeCase;

/// Irregular plurals checked before the suffix rules.
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("sex", "sexes"),
    ("move", "moves"),
    ("cow", "kine"),
    ("zombie", "zombies"),
];

/// Words that are their own plural.
const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "fish",
    "information",
    "jeans",
    "money",
    "police",
    "rice",
    "series",
    "sheep",
    "species",
];

/// Derives the table name for a model name.
///
/// # Example
/// ```
/// use modeldb::model::tableize;
///
/// assert_eq!(tableize("BlogPost"), "blog_posts");
/// assert_eq!(tableize("Category"), "categories");
/// ```
pub fn tableize(model_name: &str) -> String {
    let snake = model_name.to_snake_case();
    match snake.rsplit_once('_') {
        Some((head, last)) => format!("{}_{}", head, pluralize(last)),
        None => pluralize(&snake),
    }
}

/// Pluralizes a single lowercase English word.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    if UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }

    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return (*plural).to_string();
    }

    if let Some(stem) = word.strip_suffix('y') {
        let after_consonant = stem
            .chars()
            .last()
            .is_some_and(|c| !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'));
        if after_consonant {
            return format!("{}ies", stem);
        }
    }

    if ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| word.ends_with(suffix))
    {
        return format!("{}es", word);
    }

    format!("{}s", word)
}
