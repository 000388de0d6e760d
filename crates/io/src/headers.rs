use std::collections::HashMap;

/// Header row as column names: blank headers become `Unnamed: {i}` and
/// repeated names get `.1`, `.2`, … suffixes so every column is addressable.
pub fn header_names<I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::new();
    for (i, name) in raw.into_iter().enumerate() {
        let trimmed = name.trim();
        let base = if trimmed.is_empty() {
            format!("Unnamed: {i}")
        } else {
            trimmed.to_string()
        };
        let mut candidate = base.clone();
        if seen.contains_key(&candidate) {
            let mut n = seen.get(&base).copied().unwrap_or(0);
            while seen.contains_key(&candidate) {
                n += 1;
                candidate = format!("{base}.{n}");
            }
            seen.insert(base, n);
        }
        seen.insert(candidate.clone(), 0);
        names.push(candidate);
    }
    names
}
