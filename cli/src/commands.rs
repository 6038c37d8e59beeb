use std::path::Path;

use anyhow::{Context, Result};
use registry_core::{
    Pagination, PetForm, PetQuery, Registry, TutorForm, TutorQuery, Upload,
};
use serde_json::json;
use tracing::debug;

use crate::{PetArgs, TutorArgs};

pub(crate) async fn login(registry: &Registry, username: &str, password: &str) -> Result<()> {
    let auth = registry.auth.login(username, password).await?;
    if auth.access_token.is_empty() {
        anyhow::bail!("login succeeded but the API returned no access token");
    }
    println!("Logged in as {username}");
    Ok(())
}

pub(crate) fn logout(registry: &Registry) -> Result<()> {
    registry.auth.logout()?;
    println!("Logged out");
    Ok(())
}

pub(crate) fn status(registry: &Registry) -> Result<()> {
    if registry.auth.is_authenticated() {
        println!("Logged in");
    } else {
        println!("Not logged in");
    }
    Ok(())
}

pub(crate) async fn list_pets(
    registry: &Registry,
    page: u32,
    size: u32,
    name: Option<String>,
    breed: Option<String>,
) -> Result<()> {
    let mut query = PetQuery::new(page, size);
    query.name = name;
    query.breed = breed;
    registry.pets.load(query).await?;

    let pets: Vec<_> = registry
        .pets
        .pets()
        .into_iter()
        .map(|entry| json!({ "pet": entry.pet, "tutores": entry.tutors }))
        .collect();
    print_page(pets, registry.pets.pagination())
}

pub(crate) async fn show_pet(registry: &Registry, id: i64) -> Result<()> {
    let detail = registry.pets.get_by_id(id).await?;
    println!("{}", serde_json::to_string_pretty(&detail)?);
    Ok(())
}

pub(crate) async fn save_pet(registry: &Registry, id: Option<i64>, args: PetArgs) -> Result<()> {
    let request = PetForm {
        name: args.name,
        breed: args.breed,
        age: args.age,
    }
    .validate()?;
    let photo = args.photo.as_deref().map(read_upload).transpose()?;

    let pet = match id {
        Some(id) => registry.pets.update(id, request, photo).await?,
        None => registry.pets.create(request, photo).await?,
    };
    println!("{}", serde_json::to_string_pretty(&pet)?);
    Ok(())
}

pub(crate) async fn list_tutors(
    registry: &Registry,
    page: u32,
    size: u32,
    name: Option<String>,
) -> Result<()> {
    let mut query = TutorQuery::new(page, size);
    query.name = name;
    registry.tutors.load(query).await?;

    let tutors = registry
        .tutors
        .tutors()
        .into_iter()
        .map(|tutor| json!(tutor))
        .collect();
    print_page(tutors, registry.tutors.pagination())
}

pub(crate) async fn show_tutor(registry: &Registry, id: i64) -> Result<()> {
    let detail = registry.tutors.get_by_id(id).await?;
    println!("{}", serde_json::to_string_pretty(&detail)?);
    Ok(())
}

pub(crate) async fn save_tutor(
    registry: &Registry,
    id: Option<i64>,
    args: TutorArgs,
) -> Result<()> {
    let request = TutorForm {
        name: args.name,
        cpf: args.cpf,
        email: args.email,
        contact_kind: Some(args.contact_kind),
        contact_number: args.phone,
        address: args.address,
    }
    .validate()?;
    let photo = args.photo.as_deref().map(read_upload).transpose()?;

    let tutor = match id {
        Some(id) => registry.tutors.update(id, request, photo).await?,
        None => registry.tutors.create(request, photo).await?,
    };
    println!("{}", serde_json::to_string_pretty(&tutor)?);
    Ok(())
}

fn print_page(content: Vec<serde_json::Value>, pagination: Pagination) -> Result<()> {
    let page = json!({
        "page": pagination.page,
        "pageCount": pagination.total_pages,
        "total": pagination.total,
        "content": content,
    });
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

fn read_upload(path: &Path) -> Result<Upload> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "foto".to_string());
    let content_type = content_type_for(path).to_string();
    debug!(%file_name, %content_type, size = bytes.len(), "photo read");
    Ok(Upload {
        file_name,
        content_type,
        bytes,
    })
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for(Path::new("rex.PNG")), "image/png");
        assert_eq!(content_type_for(Path::new("a/b/mia.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("notes")), "application/octet-stream");
    }

    #[test]
    fn missing_photo_is_an_error() {
        let err = read_upload(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(err.to_string().contains("here.png"));
    }
}
