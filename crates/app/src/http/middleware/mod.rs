pub mod owner_auth;
pub mod search_query_limit;
