/// One entry of the subtitle list returned to media-center clients
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subtitle {
    pub id: String,
    /// ISO 639-1
    pub lang: String,
    pub name: String,
    pub url: String,
    pub mime_type: String,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct SubtitlesResponse {
    pub subtitles: Box<[Subtitle]>,
}

#[cfg(test)]
mod tests {
    use crate::subtitles::{Subtitle, SubtitlesResponse};

    #[test]
    fn serializes_in_client_shape() {
        let response = SubtitlesResponse {
            subtitles: [Subtitle {
                id: "wizdom-0".to_string(),
                lang: "he".to_string(),
                name: "Wizdom • Hebrew Subtitle 123".to_string(),
                url: "http://127.0.0.1:7010/proxy/vtt?src=x".to_string(),
                mime_type: "text/vtt".to_string(),
            }]
            .into(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["subtitles"][0]["mimeType"], "text/vtt");
        assert_eq!(json["subtitles"][0]["lang"], "he");

        let empty = serde_json::to_string(&SubtitlesResponse::default()).unwrap();
        assert_eq!(empty, r#"{"subtitles":[]}"#);
    }
}
