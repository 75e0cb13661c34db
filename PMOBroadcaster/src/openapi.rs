use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PMOBroadcaster API",
        version = "0.1.0",
        description = "API HTTP des flux HLS et des agendas de diffusion",
        contact(
            name = "PMOBroadcast Team",
        )
    ),
    paths(
        crate::server::stream_playlist,
        crate::server::stream_segment,
        crate::server::start_station,
        crate::server::stop_station,
        crate::server::station_status,
        crate::server::rebuild_agenda,
        crate::server::station_agenda,
    ),
    components(
        schemas(
            crate::server::StationResponse,
            crate::server::StatusResponse,
            crate::server::RebuildResponse,
        )
    ),
    tags(
        (name = "stream", description = "Playlists et segments HLS"),
        (name = "stations", description = "Cycle de vie des stations"),
        (name = "agenda", description = "Agendas de diffusion"),
    )
)]
pub struct ApiDoc;
