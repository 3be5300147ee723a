use serde::Deserialize;

pub const DEFAULT_GEO_URL: &str = "https://ipapi.co/json/";

#[derive(Deserialize)]
struct GeoResponse {
    country_code: Option<String>,
}

async fn country_code(
    client: &reqwest::Client,
    url: &str,
) -> Result<Option<String>, reqwest::Error> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.json::<GeoResponse>().await?.country_code)
}

/// Whether the caller's public IP geolocates to mainland China. Any lookup
/// failure counts as "no".
pub async fn is_china_user(client: &reqwest::Client, url: &str) -> bool {
    match country_code(client, url).await {
        Ok(code) => code.as_deref() == Some("CN"),
        Err(e) => {
            tracing::warn!(error = %e, "failed to get user location, defaulting to non-China");
            false
        }
    }
}
