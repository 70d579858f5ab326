use domain::{TitleInfo, series::EpisodeIdentifier};

/// Release suffixes tried after the bare episode tag
const RELEASE_SUFFIXES: [&str; 5] = ["1080p", "WEB", "WEB-DL", "HDTV", "BluRay"];

/// Search queries from most to least specific, without duplicates
pub fn build_queries(title: &TitleInfo, episode: Option<&EpisodeIdentifier>) -> Vec<String> {
    let name = title.title.trim();
    let mut queries = Vec::new();

    match episode {
        Some(episode) => {
            let tag = episode.tag();
            let tagged = format!("{name} {tag}");
            queries.push(tagged.clone());
            queries.extend(
                RELEASE_SUFFIXES
                    .iter()
                    .map(|suffix| format!("{tagged} {suffix}")),
            );
            queries.push(format!(
                "{name} S{:02} E{:02}",
                episode.season_no, episode.episode_no
            ));
            queries.push(format!(
                "{name} {} {}",
                episode.season_no, episode.episode_no
            ));
            queries.push(name.to_string());
        }
        None => {
            let with_year = match title.year {
                Some(year) => format!("{name} {year}"),
                None => name.to_string(),
            };
            queries.push(with_year);
            queries.push(name.to_string());
            queries.push(format!("{name} 1080p"));
        }
    }

    let mut unique = Vec::with_capacity(queries.len());
    for query in queries {
        let query = query.trim().to_string();
        if !query.is_empty() && !unique.contains(&query) {
            unique.push(query);
        }
    }
    unique
}
