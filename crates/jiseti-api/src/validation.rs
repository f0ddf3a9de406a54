//! Input checks that run before any state is touched. Every function here is
//! pure: it either returns normalized values or the reason the input was
//! rejected.

use url::Url;
use validator::ValidateEmail;

use jiseti_types::api::{
    AddMediaRequest, CreateRecordRequest, LoginRequest, RecordFilterQuery, SignupRequest,
    UpdateRecordRequest,
};
use jiseti_types::models::{Coordinates, MediaKind, RecordStatus, RecordType, VoteType};

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 8;

pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub struct NewRecord {
    pub record_type: RecordType,
    pub title: String,
    pub description: String,
    pub location: Option<Coordinates>,
    pub media: Vec<(MediaKind, String)>,
}

/// Owner-supplied changes. Coordinates are kept raw because they can only be
/// checked once merged with the stored pair.
#[derive(Debug, Default)]
pub struct RecordPatch {
    pub record_type: Option<RecordType>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Trimmed, non-empty value or `MissingField`.
pub fn required(value: Option<&str>, field: &'static str) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::MissingField(field)),
    }
}

/// Lowercased address that is syntactically valid and, when a domain policy
/// is configured, belongs to that domain.
pub fn email(raw: &str, domain: Option<&str>) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if !email.validate_email() {
        return Err(ApiError::InvalidEmail);
    }

    if let Some(domain) = domain {
        let domain = domain.trim_start_matches('@').to_lowercase();
        let actual = email.rsplit_once('@').map(|(_, d)| d).unwrap_or_default();
        if actual != domain {
            return Err(ApiError::InvalidDomain(format!("@{}", domain)));
        }
    }

    Ok(email)
}

pub fn signup(req: &SignupRequest, domain: Option<&str>) -> Result<NewAccount, ApiError> {
    let name = required(req.name.as_deref(), "name")?;
    let raw_email = required(req.email.as_deref(), "email")?;
    let email = email(&raw_email, domain)?;

    let password = req
        .password
        .clone()
        .filter(|p| !p.is_empty())
        .ok_or(ApiError::MissingField("password"))?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::WeakPassword(MIN_PASSWORD_LEN));
    }

    Ok(NewAccount {
        name,
        email,
        password,
    })
}

/// Login only normalizes; no domain policy, so a changed policy never locks
/// out existing accounts.
pub fn login(req: &LoginRequest) -> Result<Credentials, ApiError> {
    let email = required(req.email.as_deref(), "email")?.to_lowercase();
    let password = req
        .password
        .clone()
        .filter(|p| !p.is_empty())
        .ok_or(ApiError::MissingField("password"))?;
    Ok(Credentials { email, password })
}

/// Both or neither, each finite and in range.
pub fn coordinates(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<Option<Coordinates>, ApiError> {
    match (latitude, longitude) {
        (None, None) => Ok(None),
        (Some(latitude), Some(longitude)) => {
            let lat_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
            let lon_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);
            if lat_ok && lon_ok {
                Ok(Some(Coordinates {
                    latitude,
                    longitude,
                }))
            } else {
                Err(ApiError::InvalidCoordinates)
            }
        }
        _ => Err(ApiError::InvalidCoordinates),
    }
}

pub fn media_url(raw: &str, kind: MediaKind) -> Result<String, ApiError> {
    let invalid = || ApiError::InvalidMediaUrl(kind.as_str());
    let parsed = Url::parse(raw.trim()).map_err(|_| invalid())?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some_and(|h| !h.is_empty()) => {
            Ok(parsed.to_string())
        }
        _ => Err(invalid()),
    }
}

pub fn record_type(raw: &str) -> Result<RecordType, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::InvalidRecordType(raw.to_string()))
}

pub fn status(raw: &str) -> Result<RecordStatus, ApiError> {
    raw.parse().map_err(|_| ApiError::InvalidStatus(raw.to_string()))
}

pub fn vote_type(raw: Option<&str>) -> Result<VoteType, ApiError> {
    let raw = required(raw, "vote_type")?;
    raw.parse().map_err(|_| ApiError::InvalidVoteType(raw))
}

/// Optional status/type filters; blank or `all` means no filter.
pub fn filters(
    status: Option<&str>,
    record_type: Option<&str>,
) -> Result<(Option<RecordStatus>, Option<RecordType>), ApiError> {
    fn wanted(v: Option<&str>) -> Option<&str> {
        v.map(str::trim).filter(|v| !v.is_empty() && *v != "all")
    }
    let status = wanted(status).map(self::status).transpose()?;
    let record_type = wanted(record_type).map(self::record_type).transpose()?;
    Ok((status, record_type))
}

pub fn record_filters(
    query: &RecordFilterQuery,
) -> Result<(Option<RecordStatus>, Option<RecordType>), ApiError> {
    filters(query.status.as_deref(), query.record_type.as_deref())
}

/// Checked in order: title, description, type, coordinates, media URLs.
pub fn new_record(req: &CreateRecordRequest) -> Result<NewRecord, ApiError> {
    let title = required(req.title.as_deref(), "title")?;
    let description = required(req.description.as_deref(), "description")?;
    let record_type = record_type(&required(req.record_type.as_deref(), "type")?)?;
    let location = coordinates(req.latitude, req.longitude)?;
    let media = media_list(req.image_url.as_deref(), req.video_url.as_deref())?;

    Ok(NewRecord {
        record_type,
        title,
        description,
        location,
        media,
    })
}

pub fn record_patch(req: &UpdateRecordRequest) -> Result<RecordPatch, ApiError> {
    let present = |v: &Option<String>, field| v.as_deref().map(|s| required(Some(s), field)).transpose();

    Ok(RecordPatch {
        record_type: present(&req.record_type, "type")?
            .map(|t| record_type(&t))
            .transpose()?,
        title: present(&req.title, "title")?,
        description: present(&req.description, "description")?,
        latitude: req.latitude,
        longitude: req.longitude,
    })
}

/// At least one URL must be given.
pub fn media(req: &AddMediaRequest) -> Result<Vec<(MediaKind, String)>, ApiError> {
    let media = media_list(req.image_url.as_deref(), req.video_url.as_deref())?;
    if media.is_empty() {
        return Err(ApiError::MissingField("image_url"));
    }
    Ok(media)
}

fn media_list(
    image_url: Option<&str>,
    video_url: Option<&str>,
) -> Result<Vec<(MediaKind, String)>, ApiError> {
    let mut media = Vec::new();
    for (kind, raw) in [(MediaKind::Image, image_url), (MediaKind::Video, video_url)] {
        if let Some(raw) = raw.filter(|r| !r.trim().is_empty()) {
            media.push((kind, media_url(raw, kind)?));
        }
    }
    Ok(media)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(title: Option<&str>) -> CreateRecordRequest {
        CreateRecordRequest {
            record_type: Some("red-flag".into()),
            title: title.map(Into::into),
            description: Some("Something happened".into()),
            ..Default::default()
        }
    }

    #[test]
    fn blank_title_is_missing() {
        assert!(matches!(
            new_record(&create(Some("   "))),
            Err(ApiError::MissingField("title"))
        ));
        assert!(matches!(
            new_record(&create(None)),
            Err(ApiError::MissingField("title"))
        ));
    }

    #[test]
    fn title_is_checked_before_type() {
        let req = CreateRecordRequest {
            description: Some("No title provided".into()),
            ..Default::default()
        };
        assert!(matches!(new_record(&req), Err(ApiError::MissingField("title"))));
    }

    #[test]
    fn coordinate_rules() {
        assert!(coordinates(None, None).unwrap().is_none());
        assert!(coordinates(Some(-1.2921), Some(36.8219)).unwrap().is_some());
        assert!(coordinates(Some(90.0), Some(-180.0)).is_ok());
        assert!(matches!(coordinates(Some(999.0), Some(36.8)), Err(ApiError::InvalidCoordinates)));
        assert!(matches!(coordinates(Some(1.0), Some(181.0)), Err(ApiError::InvalidCoordinates)));
        assert!(matches!(coordinates(Some(1.0), None), Err(ApiError::InvalidCoordinates)));
        assert!(matches!(coordinates(Some(f64::NAN), Some(1.0)), Err(ApiError::InvalidCoordinates)));
    }

    #[test]
    fn invalid_coordinates_message_names_coordinates() {
        let msg = coordinates(Some(999.0), Some(0.0)).unwrap_err().to_string();
        assert!(msg.to_lowercase().contains("coordinates"));
    }

    #[test]
    fn media_urls_must_be_absolute_http() {
        assert_eq!(
            media_url("https://example.com/image.jpg", MediaKind::Image).unwrap(),
            "https://example.com/image.jpg"
        );
        assert!(media_url("http://cdn.example.org/v.mp4", MediaKind::Video).is_ok());

        for bad in ["not-a-valid-url", "ftp://example.com/a.jpg", "/relative/path.png", "javascript:alert(1)"] {
            let err = media_url(bad, MediaKind::Image).unwrap_err();
            assert!(matches!(err, ApiError::InvalidMediaUrl("image")), "{}", bad);
        }
        assert!(
            media_url("nope", MediaKind::Image)
                .unwrap_err()
                .to_string()
                .contains("Invalid image URL")
        );
    }

    #[test]
    fn email_is_normalized_and_domain_checked() {
        assert_eq!(email("  Jane@Gmail.com ", Some("gmail.com")).unwrap(), "jane@gmail.com");
        assert!(matches!(
            email("john@yahoo.com", Some("gmail.com")),
            Err(ApiError::InvalidDomain(_))
        ));
        assert!(matches!(email("not-an-email", None), Err(ApiError::InvalidEmail)));
        assert_eq!(email("john@yahoo.com", None).unwrap(), "john@yahoo.com");
        // subdomains are not the accepted domain
        assert!(email("x@mail.gmail.com", Some("gmail.com")).is_err());
    }

    #[test]
    fn signup_requires_a_reasonable_password() {
        let req = SignupRequest {
            name: Some("Jane".into()),
            email: Some("jane@gmail.com".into()),
            password: Some("short".into()),
            admin_number: None,
        };
        assert!(matches!(signup(&req, Some("gmail.com")), Err(ApiError::WeakPassword(8))));
    }

    #[test]
    fn patch_rejects_blank_fields_but_allows_absence() {
        let patch = record_patch(&UpdateRecordRequest {
            title: Some("Updated".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(patch.title.as_deref(), Some("Updated"));
        assert!(patch.description.is_none());

        let blank = record_patch(&UpdateRecordRequest {
            description: Some(" ".into()),
            ..Default::default()
        });
        assert!(matches!(blank, Err(ApiError::MissingField("description"))));
    }

    #[test]
    fn filters_ignore_all_and_blank() {
        assert_eq!(filters(Some("all"), Some("")).unwrap(), (None, None));
        assert_eq!(
            filters(Some("resolved"), Some("incident")).unwrap(),
            (Some(RecordStatus::Resolved), Some(RecordType::Intervention))
        );
        assert!(matches!(filters(Some("archived"), None), Err(ApiError::InvalidStatus(_))));
    }

    #[test]
    fn add_media_needs_one_url() {
        assert!(matches!(
            media(&AddMediaRequest::default()),
            Err(ApiError::MissingField("image_url"))
        ));
        let both = media(&AddMediaRequest {
            image_url: Some("https://example.com/a.png".into()),
            video_url: Some("https://example.com/a.mp4".into()),
        })
        .unwrap();
        assert_eq!(both.len(), 2);
    }
}
