use actix_multipart::form::MultipartForm;
use actix_web::{
    get,
    http::header::ContentDisposition,
    post,
    web::{Data, Path, ServiceConfig, scope},
    HttpResponse,
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use validator::Validate;

use super::models::{DownloadPath, UploadFields, UploadForm};
use super::service::{JobService, ServiceError};

#[post("/upload")]
async fn upload(
    service: Data<JobService>,
    MultipartForm(form): MultipartForm<UploadForm>,
) -> Result<HttpResponse, ServiceError> {
    let file = form.file.as_ref().ok_or(ServiceError::NoFile)?;

    let fields = UploadFields::from_form(&form);
    fields.validate().map_err(ServiceError::ValidationError)?;

    let stored_path = service.store_upload(file).await?;
    let response = service.submit(&fields, stored_path);
    Ok(HttpResponse::Ok().json(response))
}

#[get("/status/{job_id}")]
async fn job_status(
    service: Data<JobService>,
    job_id: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let status = service.status(&job_id)?;
    Ok(HttpResponse::Ok().json(status))
}

#[get("/download/{filename}")]
async fn download(
    service: Data<JobService>,
    path: actix_web_validator::Path<DownloadPath>,
) -> Result<HttpResponse, ServiceError> {
    let filename = path.into_inner().filename;
    let (file, len) = service.open_output(&filename).await?;
    debug!("Streaming {} ({} bytes)", filename, len);

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&filename))
        .insert_header(ContentDisposition::attachment(filename))
        .no_chunking(len)
        .streaming(ReaderStream::new(file)))
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "mp4" => "video/mp4",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

pub fn job_config(config: &mut ServiceConfig) {
    config.service(
        scope("api")
            .service(upload)
            .service(job_status)
            .service(download),
    );
}
