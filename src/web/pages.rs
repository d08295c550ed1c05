//! Public pages

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{Html, IntoResponse},
};

use super::{csrf, SharedState};
use crate::config::Config;
use crate::content::{SiteContent, TEAM_PER_SLIDE};
use crate::html::{escape_html, render_template};

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");

/// GET /
pub async fn index(State(state): State<SharedState>, headers: HeaderMap) -> impl IntoResponse {
    let token = csrf::token_for(&headers);
    (
        [(header::SET_COOKIE, csrf::cookie_header(&token))],
        Html(render_index(&state.content, &state.config, &token)),
    )
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    "OK"
}

pub fn render_index(content: &SiteContent, config: &Config, csrf_token: &str) -> String {
    let speakers: String = content
        .speakers
        .iter()
        .map(|s| {
            format!(
                r#"<article class="speaker"><img src="/static/{img}" alt="{name}"><h3>{name}</h3><p class="organization">{org}</p><p class="bio">{bio}</p></article>"#,
                img = escape_html(&s.img),
                name = escape_html(&s.name),
                org = escape_html(&s.organization),
                bio = escape_html(&s.bio),
            )
        })
        .collect();

    let team: String = content
        .team
        .chunks(TEAM_PER_SLIDE)
        .map(|slide| {
            let members: String = slide
                .iter()
                .map(|m| {
                    format!(
                        r#"<figure class="member"><img src="/static/{img}" alt="{name}"><figcaption>{name}<span>{position}</span></figcaption></figure>"#,
                        img = escape_html(&m.img),
                        name = escape_html(&m.name),
                        position = escape_html(&m.position),
                    )
                })
                .collect();
            format!(r#"<div class="team-slide">{members}</div>"#)
        })
        .collect();

    let indicators: String = (0..content.team_slides())
        .map(|i| format!(r#"<button type="button" class="indicator" data-slide="{i}"></button>"#))
        .collect();

    let registration = if config.site.registration_open {
        r#"<section class="registration-banner"><p>Registration is open!</p></section>"#
    } else {
        ""
    };

    let site_key = config.captcha.site_key.as_deref().unwrap_or_default();

    let roles: String = crate::form::Role::ALL
        .iter()
        .map(|r| format!(r#"<option value="{}">{}</option>"#, r.as_str(), r.label()))
        .collect();

    render_template(
        INDEX_TEMPLATE,
        &[
            ("registration", registration),
            ("speaker_count", &content.speakers.len().to_string()),
            ("speakers", &speakers),
            ("team_count", &content.team.len().to_string()),
            ("team_slides", &content.team_slides().to_string()),
            ("team", &team),
            ("team_indicators", &indicators),
            ("role_options", &roles),
            ("recaptcha_site_key", &escape_html(site_key)),
            ("csrf_token", &escape_html(csrf_token)),
        ],
    )
}
