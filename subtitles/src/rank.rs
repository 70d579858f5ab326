use domain::{
    PostCandidate,
    format::{is_subtitle_file_url, normalize_text},
    series::EpisodeIdentifier,
};

#[derive(Debug, Clone, Copy)]
pub struct Want<'a> {
    pub title: &'a str,
    pub episode: Option<&'a EpisodeIdentifier>,
}

/// Picks the post most likely to hold the wanted subtitle:
/// direct file links, then posts naming both episode and title, then the
/// episode alone, then the title alone, then whatever came first
pub fn pick<'a>(posts: &'a [PostCandidate], want: &Want) -> Option<&'a PostCandidate> {
    if let Some(direct) = posts.iter().find(|post| is_subtitle_file_url(&post.href)) {
        return Some(direct);
    }

    let title = normalize_text(want.title);
    let tag = want.episode.map(|episode| episode.tag().to_lowercase());

    let haystack = |post: &PostCandidate| {
        format!(
            "{} {}",
            post.anchor_text.to_lowercase(),
            post.href.as_str().to_lowercase()
        )
    };
    let has_tag = |post: &PostCandidate| {
        tag.as_deref()
            .is_some_and(|tag| haystack(post).contains(tag))
    };
    let has_title = |post: &PostCandidate| {
        !title.is_empty() && normalize_text(&haystack(post)).contains(&title)
    };

    posts
        .iter()
        .find(|post| has_tag(*post) && has_title(*post))
        .or_else(|| posts.iter().find(|post| has_tag(*post)))
        .or_else(|| posts.iter().find(|post| has_title(*post)))
        .or_else(|| posts.first())
}

#[cfg(test)]
mod tests {
    use domain::{PostCandidate, series::EpisodeIdentifier};
    use url::Url;

    use super::{Want, pick};

    fn post(href: &str, text: &str) -> PostCandidate {
        PostCandidate {
            href: Url::parse(href).unwrap(),
            anchor_text: text.to_string(),
        }
    }

    const EPISODE: EpisodeIdentifier = EpisodeIdentifier {
        season_no: 1,
        episode_no: 2,
    };

    #[test]
    fn direct_files_first() {
        let posts = [
            post("https://wizdom.xyz/series/tt1", "Show S01E02"),
            post("https://wizdom.xyz/api/files/sub/9", "download"),
        ];
        let want = Want {
            title: "Show",
            episode: Some(&EPISODE),
        };
        assert_eq!(pick(&posts, &want), Some(&posts[1]));
    }

    #[test]
    fn tag_and_title_before_tag_alone() {
        let posts = [
            post("https://wizdom.xyz/series/tt1", "Show"),
            post("https://wizdom.xyz/series/tt2", "Other S01E02"),
            post("https://wizdom.xyz/series/tt3", "The.Show.S01E02"),
        ];
        let want = Want {
            title: "The Show",
            episode: Some(&EPISODE),
        };
        assert_eq!(pick(&posts, &want), Some(&posts[2]));

        let want = Want {
            title: "Missing",
            episode: Some(&EPISODE),
        };
        assert_eq!(pick(&posts, &want), Some(&posts[1]));
    }

    #[test]
    fn title_then_first() {
        let posts = [
            post("https://wizdom.xyz/movie/tt1", "Something"),
            post("https://wizdom.xyz/movie/tt2", "Heat 1995"),
        ];
        let want = Want {
            title: "Heat",
            episode: None,
        };
        assert_eq!(pick(&posts, &want), Some(&posts[1]));

        let want = Want {
            title: "Ronin",
            episode: None,
        };
        assert_eq!(pick(&posts, &want), Some(&posts[0]));
        assert_eq!(pick(&[], &want), None);
    }
}
