use std::sync::Arc;

use futures_util::future::join_all;
use tracing::debug;

use super::{ListState, Pagination};
use crate::error::ApiError;
use crate::observable::Subscription;
use crate::service::PetBackend;
use crate::types::{Pet, PetDetail, PetQuery, PetRequest, Tutor, Upload};

const DEFAULT_PAGE_SIZE: u32 = 10;

/// A listed pet, enriched with its tutors when the detail fetch succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetEntry {
    pub pet: Pet,
    pub tutors: Option<Vec<Tutor>>,
}

/// Observable pet list backed by a `PetBackend`.
pub struct PetFacade {
    backend: Arc<dyn PetBackend>,
    state: ListState<PetEntry, PetQuery>,
}

impl PetFacade {
    pub fn new(backend: Arc<dyn PetBackend>) -> Self {
        Self {
            backend,
            state: ListState::new(PetQuery::new(0, DEFAULT_PAGE_SIZE)),
        }
    }

    pub fn pets(&self) -> Vec<PetEntry> {
        self.state.items()
    }

    pub fn subscribe_pets(&self) -> Subscription<Vec<PetEntry>> {
        self.state.subscribe_items()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn subscribe_loading(&self) -> Subscription<bool> {
        self.state.subscribe_loading()
    }

    pub fn pagination(&self) -> Pagination {
        self.state.pagination()
    }

    pub fn subscribe_pagination(&self) -> Subscription<Pagination> {
        self.state.subscribe_pagination()
    }

    /// Fetch a page, enrich every pet with its tutors, and publish it.
    pub async fn load(&self, query: PetQuery) -> Result<(), ApiError> {
        self.state
            .tracked("load pets", async {
                let generation = self.state.begin_load(query.clone());
                let page = self.backend.list(&query).await?;
                let pagination = Pagination::from(&page);
                let entries = join_all(page.content.into_iter().map(|pet| self.enrich(pet))).await;
                self.state.publish_page(generation, entries, pagination);
                Ok::<_, ApiError>(())
            })
            .await
    }

    /// Reload with the last issued query.
    pub async fn reload(&self) -> Result<(), ApiError> {
        self.load(self.state.last_query()).await
    }

    async fn enrich(&self, pet: Pet) -> PetEntry {
        match self.backend.get(pet.id).await {
            Ok(detail) => PetEntry {
                pet,
                tutors: Some(detail.tutors),
            },
            Err(e) => {
                debug!(pet_id = pet.id, error = %e, "could not fetch pet tutors");
                PetEntry { pet, tutors: None }
            }
        }
    }

    pub async fn create(&self, input: PetRequest, photo: Option<Upload>) -> Result<Pet, ApiError> {
        self.state
            .tracked("create pet", async {
                let pet = self.backend.create(&input).await?;
                if let Some(photo) = &photo {
                    self.backend.upload_photo(pet.id, photo).await?;
                }
                self.reload().await?;
                Ok::<_, ApiError>(pet)
            })
            .await
    }

    pub async fn update(
        &self,
        id: i64,
        input: PetRequest,
        photo: Option<Upload>,
    ) -> Result<Pet, ApiError> {
        self.state
            .tracked("update pet", async {
                let pet = self.backend.update(id, &input).await?;
                if let Some(photo) = &photo {
                    self.backend.upload_photo(id, photo).await?;
                }
                self.reload().await?;
                Ok::<_, ApiError>(pet)
            })
            .await
    }

    pub async fn remove(&self, id: i64) -> Result<(), ApiError> {
        self.state
            .tracked("remove pet", async {
                self.backend.delete(id).await?;
                self.reload().await
            })
            .await
    }

    /// Fetch one pet with its tutors. Published state is left untouched.
    pub async fn get_by_id(&self, id: i64) -> Result<PetDetail, ApiError> {
        self.backend.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::types::{Attachment, Page};

    /// Pages are served from a script; each entry may carry a delay.
    #[derive(Default)]
    struct ScriptedPets {
        pages: Mutex<VecDeque<(Duration, Result<Page<Pet>, ApiError>)>>,
        detail_fails: bool,
        created: Mutex<Vec<PetRequest>>,
        uploads: AtomicUsize,
        deleted: Mutex<Vec<i64>>,
        queries: Mutex<Vec<PetQuery>>,
    }

    impl ScriptedPets {
        fn push_page(&self, delay_ms: u64, page: Result<Page<Pet>, ApiError>) {
            self.pages
                .lock()
                .unwrap()
                .push_back((Duration::from_millis(delay_ms), page));
        }
    }

    #[async_trait]
    impl PetBackend for ScriptedPets {
        async fn list(&self, query: &PetQuery) -> Result<Page<Pet>, ApiError> {
            self.queries.lock().unwrap().push(query.clone());
            let next = self.pages.lock().unwrap().pop_front();
            let (delay, page) = next.unwrap_or((Duration::ZERO, Ok(page_of(vec![]))));
            tokio::time::sleep(delay).await;
            page
        }

        async fn get(&self, id: i64) -> Result<PetDetail, ApiError> {
            if self.detail_fails {
                return Err(ApiError::HttpError {
                    status: 500,
                    body: String::new(),
                });
            }
            Ok(PetDetail {
                pet: pet(id, "any"),
                tutors: vec![],
            })
        }

        async fn create(&self, input: &PetRequest) -> Result<Pet, ApiError> {
            self.created.lock().unwrap().push(input.clone());
            Ok(pet(2, &input.name))
        }

        async fn update(&self, id: i64, input: &PetRequest) -> Result<Pet, ApiError> {
            Ok(pet(id, &input.name))
        }

        async fn delete(&self, id: i64) -> Result<(), ApiError> {
            self.deleted.lock().unwrap().push(id);
            Ok(())
        }

        async fn upload_photo(&self, id: i64, upload: &Upload) -> Result<Attachment, ApiError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(Attachment {
                id: 1,
                name: upload.file_name.clone(),
                content_type: upload.content_type.clone(),
                url: format!("/fotos/{id}"),
            })
        }
    }

    fn pet(id: i64, name: &str) -> Pet {
        Pet {
            id,
            name: name.to_string(),
            breed: None,
            age: None,
            photo: None,
        }
    }

    fn page_of(content: Vec<Pet>) -> Page<Pet> {
        let total = content.len() as u64;
        Page {
            page: 0,
            size: 10,
            total,
            page_count: if total == 0 { 0 } else { 1 },
            content,
        }
    }

    fn facade(backend: Arc<ScriptedPets>) -> PetFacade {
        PetFacade::new(backend)
    }

    #[tokio::test]
    async fn load_publishes_page_and_pagination() {
        let backend = Arc::new(ScriptedPets::default());
        backend.push_page(0, Ok(page_of(vec![pet(1, "Rex")])));
        let facade = facade(backend.clone());

        facade
            .load(PetQuery::new(0, 10).with_name("Rex"))
            .await
            .unwrap();

        let pets = facade.subscribe_pets().try_next().unwrap();
        assert_eq!(pets.len(), 1);
        assert_eq!(pets[0].pet.name, "Rex");
        assert_eq!(pets[0].tutors, Some(vec![]));
        assert_eq!(facade.pagination().total_pages, 1);
        assert_eq!(facade.subscribe_loading().try_next(), Some(false));
        assert_eq!(backend.queries.lock().unwrap()[0].name.as_deref(), Some("Rex"));
    }

    #[tokio::test]
    async fn failed_enrichment_keeps_bare_pet() {
        let backend = Arc::new(ScriptedPets {
            detail_fails: true,
            ..ScriptedPets::default()
        });
        backend.push_page(0, Ok(page_of(vec![pet(1, "Rex"), pet(2, "Mia")])));
        let facade = facade(backend);

        facade.load(PetQuery::new(0, 10)).await.unwrap();

        let pets = facade.pets();
        assert_eq!(pets.len(), 2);
        assert!(pets.iter().all(|p| p.tutors.is_none()));
    }

    #[tokio::test]
    async fn load_error_clears_loading_and_keeps_state() {
        let backend = Arc::new(ScriptedPets::default());
        backend.push_page(0, Err(ApiError::Transport("offline".to_string())));
        let facade = facade(backend);
        let mut loading = facade.subscribe_loading();

        let err = facade.load(PetQuery::new(0, 10)).await.unwrap_err();

        assert_eq!(err, ApiError::Transport("offline".to_string()));
        assert!(!facade.is_loading());
        assert_eq!(loading.drain(), vec![false, true, false]);
        assert!(facade.pets().is_empty());
    }

    #[tokio::test]
    async fn create_tracks_loading_and_reloads_last_query() {
        let backend = Arc::new(ScriptedPets::default());
        backend.push_page(0, Ok(page_of(vec![])));
        let facade = facade(backend.clone());
        facade.load(PetQuery::new(3, 5).with_breed("Poodle")).await.unwrap();
        let mut loading = facade.subscribe_loading();

        let photo = Upload {
            file_name: "thor.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![0xff],
        };
        let created = facade
            .create(
                PetRequest {
                    name: "Thor".to_string(),
                    breed: Some("Labrador".to_string()),
                    age: Some(2),
                },
                Some(photo),
            )
            .await
            .unwrap();

        assert_eq!(created.name, "Thor");
        assert_eq!(backend.created.lock().unwrap()[0].breed.as_deref(), Some("Labrador"));
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(loading.drain(), vec![false, true, false]);
        let queries = backend.queries.lock().unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1], PetQuery::new(3, 5).with_breed("Poodle"));
    }

    #[tokio::test]
    async fn remove_deletes_then_reloads() {
        let backend = Arc::new(ScriptedPets::default());
        let facade = facade(backend.clone());

        facade.remove(9).await.unwrap();

        assert_eq!(backend.deleted.lock().unwrap().as_slice(), &[9]);
        assert_eq!(backend.queries.lock().unwrap().len(), 1);
        assert!(!facade.is_loading());
    }

    #[tokio::test]
    async fn get_by_id_does_not_publish() {
        let backend = Arc::new(ScriptedPets::default());
        let facade = facade(backend);
        let mut pets = facade.subscribe_pets();

        let detail = facade.get_by_id(4).await.unwrap();

        assert_eq!(detail.pet.id, 4);
        assert_eq!(pets.drain(), vec![Vec::<PetEntry>::new()]);
        assert!(!facade.is_loading());
    }

    #[tokio::test]
    async fn slow_older_load_does_not_overwrite_newer() {
        let backend = Arc::new(ScriptedPets::default());
        backend.push_page(80, Ok(page_of(vec![pet(1, "Old")])));
        backend.push_page(0, Ok(page_of(vec![pet(2, "New")])));
        let facade = facade(backend);

        let (first, second) = tokio::join!(
            facade.load(PetQuery::new(0, 10)),
            facade.load(PetQuery::new(1, 10)),
        );
        first.unwrap();
        second.unwrap();

        let pets = facade.pets();
        assert_eq!(pets.len(), 1);
        assert_eq!(pets[0].pet.name, "New");
        assert!(!facade.is_loading());
    }
}
