use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for FlashQuiz Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::catalog::create_user,
        crate::routes::catalog::get_user,
        crate::routes::catalog::update_presence,
        crate::routes::catalog::create_deck,
        crate::routes::catalog::get_deck,
        crate::routes::invitation::create_invitation,
        crate::routes::invitation::get_invitation,
        crate::routes::invitation::delete_invitation,
        crate::routes::invitation::list_sent,
        crate::routes::invitation::list_received,
        crate::routes::invitation::cancel_by_sender,
        crate::routes::invitation::earliest_accepted,
        crate::routes::invitation::confirm,
        crate::routes::invitation::reject,
        crate::routes::quiz::start_quiz,
        crate::routes::quiz::start_if_ready,
        crate::routes::quiz::current_question,
        crate::routes::quiz::submit_answer,
        crate::routes::quiz::quiz_status,
        crate::routes::quiz::quit_quiz,
        crate::routes::quiz::scores,
        crate::routes::statistics::quiz_statistics,
        crate::routes::statistics::set_winner,
        crate::routes::statistics::user_statistics,
        crate::routes::sse::quiz_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::catalog::CreateUserRequest,
            crate::dto::catalog::PresenceUpdateRequest,
            crate::dto::catalog::UserView,
            crate::dto::catalog::FlashcardInput,
            crate::dto::catalog::CreateDeckRequest,
            crate::dto::catalog::FlashcardView,
            crate::dto::catalog::DeckView,
            crate::dto::invitation::CreateInvitationRequest,
            crate::dto::invitation::InvitationView,
            crate::dto::quiz::StartQuizRequest,
            crate::dto::quiz::AnswerRequest,
            crate::dto::quiz::AnswerResponse,
            crate::dto::quiz::QuestionView,
            crate::dto::quiz::QuizView,
            crate::dto::quiz::ScoreView,
            crate::dto::statistics::StatisticsView,
            crate::dto::statistics::WinnerRequest,
            crate::dto::sse::Handshake,
            crate::dto::sse::QuizUpdateEvent,
            crate::dto::sse::PlayerProgress,
            crate::dto::sse::UpdateType,
            crate::dao::models::Presence,
            crate::dao::models::QuizStatus,
            crate::dao::models::Outcome,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "catalog", description = "Users and decks"),
        (name = "invitation", description = "Two-player invitations"),
        (name = "quiz", description = "Quiz runtime"),
        (name = "statistics", description = "Per-player quiz statistics"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
