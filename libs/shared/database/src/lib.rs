pub mod supabase;

pub use supabase::{first_row, row_without_id, DatabaseError, SupabaseClient};
