use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};
use crate::files::UploadTarget;
use crate::models::{MaterialFilter, MaterialId, MaterialView, NewMaterial, StudyMaterial};
use crate::portal::{require_account, Caller, Portal};

impl Portal {
    pub async fn generate_upload_target(&self, caller: Caller) -> PortalResult<UploadTarget> {
        require_account(caller)?;
        self.files.generate_upload_target().await
    }

    /// Records material metadata. The download count starts at zero.
    pub async fn upload_material(&self, caller: Caller, input: NewMaterial) -> PortalResult<MaterialId> {
        let account = require_account(caller)?;
        input.validate()?;

        let material = StudyMaterial {
            id: Uuid::new_v4(),
            title: input.title,
            subject: input.subject,
            branch: input.branch,
            term: input.term,
            kind: input.kind,
            storage_id: input.storage_id,
            description: input.description,
            uploaded_by: account,
            tags: input.tags,
            download_count: 0,
            created_at: Utc::now(),
        };
        self.store.insert_material(&material).await?;
        info!(material_id = %material.id, kind = %material.kind, "material uploaded");
        Ok(material.id)
    }

    pub async fn materials(&self, filter: &MaterialFilter) -> PortalResult<Vec<MaterialView>> {
        let materials = self.store.materials(&filter.index()).await?;

        let mut views = Vec::with_capacity(materials.len());
        for material in materials {
            let file_url = match material.storage_id {
                Some(id) => self.files.url(id).await?,
                None => None,
            };
            views.push(MaterialView { material, file_url });
        }
        Ok(views)
    }

    /// Bumps the download counter by one and returns the new value.
    pub async fn record_download(&self, id: MaterialId) -> PortalResult<i32> {
        self.store
            .increment_download_count(id)
            .await?
            .ok_or(PortalError::NotFound("study material"))
    }
}
