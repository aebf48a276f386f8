const ARTICLES: [&str; 3] = ["a", "an", "the"];

/// Builds the search key for a display name: lowercased, with standalone
/// articles removed. Write paths and lookups both go through here.
pub fn normalize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let words: Vec<&str> = lowered
        .split(' ')
        .filter(|word| !ARTICLES.contains(word))
        .collect();

    words.join(" ").trim().to_string()
}
