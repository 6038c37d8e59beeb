use std::sync::Arc;

use super::{ListState, Pagination};
use crate::error::ApiError;
use crate::observable::Subscription;
use crate::service::TutorBackend;
use crate::types::{Tutor, TutorDetail, TutorQuery, TutorRequest, Upload};

const DEFAULT_PAGE_SIZE: u32 = 10;

/// Observable tutor list backed by a `TutorBackend`.
pub struct TutorFacade {
    backend: Arc<dyn TutorBackend>,
    state: ListState<Tutor, TutorQuery>,
}

impl TutorFacade {
    pub fn new(backend: Arc<dyn TutorBackend>) -> Self {
        Self {
            backend,
            state: ListState::new(TutorQuery::new(0, DEFAULT_PAGE_SIZE)),
        }
    }

    pub fn tutors(&self) -> Vec<Tutor> {
        self.state.items()
    }

    pub fn subscribe_tutors(&self) -> Subscription<Vec<Tutor>> {
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

    pub async fn load(&self, query: TutorQuery) -> Result<(), ApiError> {
        self.state
            .tracked("load tutors", async {
                let generation = self.state.begin_load(query.clone());
                let page = self.backend.list(&query).await?;
                let pagination = Pagination::from(&page);
                self.state.publish_page(generation, page.content, pagination);
                Ok::<_, ApiError>(())
            })
            .await
    }

    pub async fn reload(&self) -> Result<(), ApiError> {
        self.load(self.state.last_query()).await
    }

    pub async fn create(
        &self,
        input: TutorRequest,
        photo: Option<Upload>,
    ) -> Result<Tutor, ApiError> {
        self.state
            .tracked("create tutor", async {
                let tutor = self.backend.create(&input).await?;
                if let Some(photo) = &photo {
                    self.backend.upload_photo(tutor.id, photo).await?;
                }
                self.reload().await?;
                Ok::<_, ApiError>(tutor)
            })
            .await
    }

    pub async fn update(
        &self,
        id: i64,
        input: TutorRequest,
        photo: Option<Upload>,
    ) -> Result<Tutor, ApiError> {
        self.state
            .tracked("update tutor", async {
                let tutor = self.backend.update(id, &input).await?;
                if let Some(photo) = &photo {
                    self.backend.upload_photo(id, photo).await?;
                }
                self.reload().await?;
                Ok::<_, ApiError>(tutor)
            })
            .await
    }

    pub async fn remove(&self, id: i64) -> Result<(), ApiError> {
        self.state
            .tracked("remove tutor", async {
                self.backend.delete(id).await?;
                self.reload().await
            })
            .await
    }

    /// Fetch one tutor with their pets. Published state is left untouched.
    pub async fn get_by_id(&self, id: i64) -> Result<TutorDetail, ApiError> {
        self.backend.get(id).await
    }

    /// Callers reload if they need the list to reflect the new link.
    pub async fn link_pet(&self, tutor_id: i64, pet_id: i64) -> Result<(), ApiError> {
        self.backend.link_pet(tutor_id, pet_id).await
    }

    pub async fn unlink_pet(&self, tutor_id: i64, pet_id: i64) -> Result<(), ApiError> {
        self.backend.unlink_pet(tutor_id, pet_id).await
    }
}
