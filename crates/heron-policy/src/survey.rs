//! Outbound survey links.
//!
//! Pure URL construction; none of this grants or checks anything.

use heron_types::Identity;
use url::Url;

/// Why a faculty member is filling in the oversight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OversightPurpose {
    Sponsorship,
    DataUse,
}

impl OversightPurpose {
    /// Value of the `what_for` survey field.
    pub fn code(self) -> &'static str {
        match self {
            Self::Sponsorship => "1",
            Self::DataUse => "2",
        }
    }
}

/// Builds `<base>?s=<code>&<params sorted by name>`.
///
/// Any query already on `base` is replaced.
pub fn survey_link(base: &Url, code: &str, mut params: Vec<(String, String)>) -> Url {
    params.sort();
    let mut link = base.clone();
    link.set_query(None);
    {
        let mut query = link.query_pairs_mut();
        query.append_pair("s", code);
        for (name, value) in &params {
            query.append_pair(name, value);
        }
    }
    link
}

/// Parameters that pre-fill the system access agreement.
pub fn agreement_params(identity: &Identity) -> Vec<(String, String)> {
    vec![
        ("full_name".to_string(), identity.sort_name()),
        ("user_id".to_string(), identity.id.to_string()),
    ]
}

/// Parameters that pre-fill an oversight request for `team`, numbered from 1.
pub fn team_params(team: &[Identity]) -> Vec<(String, String)> {
    team.iter()
        .enumerate()
        .flat_map(|(i, member)| {
            let n = i + 1;
            [
                (format!("user_id_{n}"), member.id.to_string()),
                (format!("name_etc_{n}"), name_etc(member)),
            ]
        })
        .collect()
}

/// "Surname, Given\nTitle\nOrgUnit".
fn name_etc(member: &Identity) -> String {
    format!(
        "{}\n{}\n{}",
        member.sort_name(),
        member.title.as_deref().unwrap_or_default(),
        member.org_unit
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn john() -> Identity {
        Identity::new("john.smith", "John", "Smith", "john.smith@js.example")
    }

    #[test]
    fn agreement_link_sorts_params_after_code() {
        let base = Url::parse("http://bmidev1/redcap-host/surveys/").unwrap();

        let link = survey_link(&base, "8074", agreement_params(&john()));

        assert_eq!(
            link.as_str(),
            "http://bmidev1/redcap-host/surveys/?s=8074&full_name=Smith%2C+John&user_id=john.smith"
        );
    }

    #[test]
    fn existing_query_is_replaced() {
        let base = Url::parse("http://survey.example/?s=old&x=1").unwrap();

        let link = survey_link(&base, "abc", vec![]);

        assert_eq!(link.as_str(), "http://survey.example/?s=abc");
    }

    #[test]
    fn team_members_are_numbered_from_one() {
        let carol = Identity::new("carol.student", "Carol", "Student", "carol@js.example")
            .with_title("Student")
            .with_org_unit("Pharmacy");

        let params = team_params(&[john(), carol]);

        assert_eq!(
            params,
            vec![
                ("user_id_1".to_string(), "john.smith".to_string()),
                ("name_etc_1".to_string(), "Smith, John\n\n".to_string()),
                ("user_id_2".to_string(), "carol.student".to_string()),
                (
                    "name_etc_2".to_string(),
                    "Student, Carol\nStudent\nPharmacy".to_string()
                ),
            ]
        );
    }

    #[test]
    fn purpose_codes() {
        assert_eq!(OversightPurpose::Sponsorship.code(), "1");
        assert_eq!(OversightPurpose::DataUse.code(), "2");
    }
}
