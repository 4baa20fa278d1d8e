//! Destination path generation
//!
//! Uniqueness is the caller's job: a millisecond timestamp plus a random
//! base-36 suffix, keeping the original extension.

use rand::Rng;

const SUFFIX_LEN: usize = 13;
const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Build `posts/{owner}/{millis}-{suffix}.{ext}` for an uploaded file.
pub fn object_path(owner: &str, file_name: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();

    format!("posts/{}/{}-{}.{}", owner, millis, suffix, extension(file_name))
}

/// Text after the last dot; the whole name when there is no dot.
fn extension(file_name: &str) -> &str {
    file_name.rsplit('.').next().unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_shape() {
        let path = object_path("42", "clip.final.mp4");
        let parts: Vec<&str> = path.split('/').collect();
        assert_eq!(parts[0], "posts");
        assert_eq!(parts[1], "42");

        let name = parts[2];
        assert!(name.ends_with(".mp4"));
        let stem = name.trim_end_matches(".mp4");
        let (millis, suffix) = stem.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), SUFFIX_LEN);
    }

    #[test]
    fn test_object_paths_differ() {
        assert_ne!(object_path("1", "a.png"), object_path("1", "a.png"));
    }

    #[test]
    fn test_extension_without_dot() {
        assert_eq!(extension("README"), "README");
    }
}
